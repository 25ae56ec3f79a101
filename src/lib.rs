//! Metrical structure toolkit.
//!
//! At first, a [`Meter`] is built from a time signature, which constructs
//! its subdivision tree. From the tree a depthwise offset inventory is
//! read, and from the inventory an accent kernel is generated. Kernels
//! score how strongly a set of time points sits on a meter's grid:
//! [`fit_meters`] uses them to select a meter sequence covering a whole
//! timeline, and [`MeterRewriter`] splits and fuses note groups until
//! their boundaries sit on the grid of one chosen meter.

use fraction::Fraction;

pub mod fit;
pub mod fraction_tools;
pub mod group;
pub mod kernel;
pub mod meter;
pub mod rewrite;
pub mod rtm;
pub mod tree;

pub use fit::{fit_meters, MeterFittingSession};
pub use group::{GroupInfo, GroupKind, NestedGroup, Note};
pub use kernel::{OffsetCounter, OffsetKernel};
pub use meter::Meter;
pub use rewrite::MeterRewriter;
pub use rtm::RtmNode;
pub use tree::{MeterTree, NodeId};

/// Exact rational position on a timeline.
pub type Offset = Fraction;
/// Exact rational musical duration.
pub type Duration = Fraction;

#[derive(Debug, thiserror::Error)]
pub enum MeterError {
    #[error("Invalid meter argument: {0}")]
    InvalidArgument(String),
    #[error(
        "Node {numerator}/{denominator} does not sum its children: \
        children cover {children_sum}"
    )]
    Prolation {
        numerator: u64,
        denominator: u64,
        children_sum: Fraction,
    },
    #[error(
        "Kernel denominator {requested} is not a positive power-of-two \
        multiple of meter denominator {base}"
    )]
    KernelDenominator { requested: u64, base: u64 },
}
pub type MeterResult<T> = Result<T, MeterError>;
