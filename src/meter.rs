//! Meter: a time signature with its canonical subdivision tree.

use std::collections::BTreeMap;
use std::fmt;

use fraction::Fraction;
use itertools::Itertools;
use once_cell::sync::OnceCell;

use crate::fraction_tools::flag_count;
use crate::kernel::OffsetKernel;
use crate::rtm::RtmNode;
use crate::tree::MeterTree;
use crate::{Duration, MeterError, MeterResult, Offset};

/// A time signature together with its subdivision tree and the views
/// derived from it. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Meter {
    numerator: u64,
    denominator: u64,
    increase_monotonic: bool,
    preferred_boundary_depth: Option<usize>,
    tree: MeterTree,
    inventory: OnceCell<Vec<Vec<Offset>>>,
}

impl PartialEq for Meter {
    fn eq(&self, other: &Self) -> bool {
        self.numerator == other.numerator
            && self.denominator == other.denominator
            && self.tree == other.tree
    }
}
impl Eq for Meter {}

impl From<&Meter> for Meter {
    fn from(meter: &Meter) -> Self {
        meter.clone()
    }
}

impl Meter {
    /// # Example
    /// ```
    /// # use metrum::Meter;
    /// assert_eq!(
    ///     Meter::new(7, 4).rtm_format(),
    ///     "(7/4 ((3/4 (1/4 1/4 1/4)) (2/4 (1/4 1/4)) (2/4 (1/4 1/4))))"
    /// );
    /// ```
    pub fn new(numerator: u64, denominator: u64) -> Self {
        Self::with_config(numerator, denominator, false, None)
    }

    /// Full constructor: `increase_monotonic` orders irregular groupings
    /// of 2s and 3s ascending instead of descending,
    /// `preferred_boundary_depth` is picked up by the rewriter as its
    /// default boundary depth.
    pub fn with_config(
        numerator: u64,
        denominator: u64,
        increase_monotonic: bool,
        preferred_boundary_depth: impl Into<Option<usize>>,
    ) -> Self {
        let tree = MeterTree::for_time_signature(numerator, denominator, increase_monotonic);
        Self {
            numerator,
            denominator,
            increase_monotonic,
            preferred_boundary_depth: preferred_boundary_depth.into(),
            tree,
            inventory: OnceCell::new(),
        }
    }

    /// Adopt an existing tree; the signature is read off its root.
    pub fn from_tree(tree: MeterTree) -> MeterResult<Self> {
        tree.validate()?;
        let (numerator, denominator) = tree.written(tree.root());
        if numerator == 0 || denominator == 0 {
            return Err(MeterError::InvalidArgument(format!(
                "zero signature member: {numerator}/{denominator}"
            )));
        }
        Ok(Self {
            numerator,
            denominator,
            increase_monotonic: false,
            preferred_boundary_depth: None,
            tree,
            inventory: OnceCell::new(),
        })
    }

    /// Construct from an already-tokenized rtm tree.
    pub fn from_rtm_tree(node: &RtmNode) -> MeterResult<Self> {
        Self::from_tree(MeterTree::from_rtm(node)?)
    }

    /// Construct from a plain duration, read as a reduced signature:
    /// 3/8 becomes the 3/8 meter.
    pub fn from_duration(duration: Duration) -> MeterResult<Self> {
        if duration.is_sign_negative() {
            return Err(MeterError::InvalidArgument(format!(
                "negative meter duration: {duration}"
            )));
        }
        let (numerator, denominator) = match (duration.numer(), duration.denom()) {
            (Some(numerator), Some(denominator)) => (*numerator, *denominator),
            _ => {
                return Err(MeterError::InvalidArgument(format!(
                    "meter duration is not a finite rational: {duration}"
                )))
            }
        };
        if numerator == 0 {
            return Err(MeterError::InvalidArgument(
                "meter duration should be positive".to_string(),
            ));
        }
        Ok(Self::new(numerator, denominator))
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }
    pub fn denominator(&self) -> u64 {
        self.denominator
    }
    pub fn increase_monotonic(&self) -> bool {
        self.increase_monotonic
    }
    pub fn preferred_boundary_depth(&self) -> Option<usize> {
        self.preferred_boundary_depth
    }
    pub fn tree(&self) -> &MeterTree {
        &self.tree
    }

    pub fn duration(&self) -> Duration {
        Fraction::new(self.numerator, self.denominator)
    }

    /// # Example
    /// ```
    /// # use metrum::Meter;
    /// assert!(Meter::new(6, 8).is_compound());
    /// assert!(Meter::new(3, 4).is_simple());
    /// assert!(Meter::new(4, 4).is_simple());
    /// ```
    pub fn is_compound(&self) -> bool {
        self.numerator % 3 == 0 && self.numerator != 3
    }
    pub fn is_simple(&self) -> bool {
        !self.is_compound()
    }

    /// Canonical one-line parenthesized form.
    pub fn rtm_format(&self) -> String {
        self.tree.to_rtm().render()
    }

    /// Indented multi-line form of [rtm_format](Self::rtm_format).
    pub fn pretty_rtm_format(&self) -> String {
        self.tree.to_rtm().render_pretty()
    }

    pub fn as_rtm_tree(&self) -> RtmNode {
        self.tree.to_rtm()
    }

    /// Sorted node-start offsets per tree depth, each level refining the
    /// one above it. Computed once per meter.
    pub fn depthwise_offset_inventory(&self) -> &[Vec<Offset>] {
        self.inventory
            .get_or_init(|| self.tree.depthwise_start_offsets())
    }

    /// Offsets at the requested depth; levels past the natural tree
    /// height are synthesized by the fixed bisection rule.
    pub fn offsets_at_depth(&self, depth: usize) -> Vec<Offset> {
        let natural = self.depthwise_offset_inventory();
        if let Some(level) = natural.get(depth) {
            return level.clone();
        }
        let mut level = natural
            .last()
            .expect("inventory always holds the root level")
            .clone();
        for _ in natural.len()..=depth {
            level = synthesize_next_level(&level);
        }
        level
    }

    /// Accent kernel of the meter refined down to `denominator`.
    ///
    /// `normalize` defaults to true; unnormalized kernels keep the raw
    /// per-offset tallies.
    ///
    /// # Returns
    /// Err unless `denominator / self.denominator` is a positive power
    /// of two.
    ///
    /// # Example
    /// ```
    /// # use fraction::Fraction;
    /// # use metrum::Meter;
    /// let kernel = Meter::new(4, 4).generate_offset_kernel(8, None).unwrap();
    /// assert_eq!(
    ///     kernel.weights()[&Fraction::from(0.0)],
    ///     Fraction::new(3u64, 16u64)
    /// );
    /// assert_eq!(
    ///     kernel.weights()[&Fraction::new(1u64, 8u64)],
    ///     Fraction::new(1u64, 16u64)
    /// );
    /// ```
    pub fn generate_offset_kernel(
        &self,
        denominator: u64,
        normalize: impl Into<Option<bool>>,
    ) -> MeterResult<OffsetKernel> {
        let normalize = normalize.into().unwrap_or(true);
        if denominator == 0
            || denominator % self.denominator != 0
            || !(denominator / self.denominator).is_power_of_two()
        {
            return Err(MeterError::KernelDenominator {
                requested: denominator,
                base: self.denominator,
            });
        }
        let mut inventory = self.depthwise_offset_inventory().to_vec();
        let extra_depth = flag_count(Fraction::new(1u64, denominator))
            - flag_count(Fraction::new(1u64, self.denominator));
        for _ in 0..extra_depth {
            let next = synthesize_next_level(
                inventory.last().expect("inventory always holds the root level"),
            );
            inventory.push(next);
        }
        let mut counts: BTreeMap<Offset, u64> = BTreeMap::new();
        let mut total = 0u64;
        for level in &inventory {
            for offset in level {
                *counts.entry(*offset).or_insert(0) += 1;
                total += 1;
            }
        }
        let weights = counts
            .into_iter()
            .map(|(offset, count)| {
                let weight = match normalize {
                    true => Fraction::new(count, total),
                    false => Fraction::new(count, 1u64),
                };
                (offset, weight)
            })
            .collect();
        Ok(OffsetKernel::new(weights, self.duration()))
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// One inventory level below `offsets`: spans wider than an eighth get
/// their midpoint, narrower spans get the quarter, half and three-quarter
/// points. A fixed rule, kept as-is for compatibility with existing
/// output.
pub(crate) fn synthesize_next_level(offsets: &[Offset]) -> Vec<Offset> {
    let half = Fraction::new(1u64, 2u64);
    let threshold = Fraction::new(1u64, 8u64);
    let mut next = Vec::new();
    for (first, second) in offsets.iter().tuple_windows() {
        next.push(*first);
        let midpoint = (*first + *second) * half;
        if threshold < *second - *first {
            next.push(midpoint);
        } else {
            next.push((*first + midpoint) * half);
            next.push(midpoint);
            next.push((midpoint + *second) * half);
        }
    }
    if let Some(last) = offsets.last() {
        next.push(*last);
    }
    next
}

#[cfg(test)]
mod tests {
    use fraction::Fraction;

    use super::{synthesize_next_level, Meter};

    #[test]
    fn test_compound_and_simple() {
        for numerator in 1..=12u64 {
            let meter = Meter::new(numerator, 4);
            let compound = numerator % 3 == 0 && numerator != 3;
            assert_eq!(meter.is_compound(), compound, "{meter}");
            assert_eq!(meter.is_simple(), !compound, "{meter}");
        }
    }

    #[test]
    fn test_increase_monotonic_ordering() {
        let meter = Meter::new(5, 4);
        let tree = meter.tree();
        let groups: Vec<_> = tree
            .children(tree.root())
            .iter()
            .map(|id| tree.written(*id))
            .collect();
        assert_eq!(groups, vec![(3, 4), (2, 4)]);

        let meter = Meter::with_config(5, 4, true, None);
        let tree = meter.tree();
        let groups: Vec<_> = tree
            .children(tree.root())
            .iter()
            .map(|id| tree.written(*id))
            .collect();
        assert_eq!(groups, vec![(2, 4), (3, 4)]);
    }

    #[test]
    fn test_synthesize_wide_and_narrow_spans() {
        // quarter spans take only their midpoint
        let level = vec![Fraction::from(0.0), Fraction::new(1u64, 4u64)];
        assert_eq!(
            synthesize_next_level(&level),
            vec![
                Fraction::from(0.0),
                Fraction::new(1u64, 8u64),
                Fraction::new(1u64, 4u64),
            ]
        );
        // eighth spans split into quarters of the span
        let level = vec![Fraction::from(0.0), Fraction::new(1u64, 8u64)];
        assert_eq!(
            synthesize_next_level(&level),
            vec![
                Fraction::from(0.0),
                Fraction::new(1u64, 32u64),
                Fraction::new(1u64, 16u64),
                Fraction::new(3u64, 32u64),
                Fraction::new(1u64, 8u64),
            ]
        );
    }

    #[test]
    fn test_offsets_at_depth_extends_the_tree() {
        let meter = Meter::new(4, 4);
        assert_eq!(
            meter.offsets_at_depth(0),
            vec![Fraction::from(0.0), Fraction::from(1.0)]
        );
        let beats = meter.offsets_at_depth(1);
        assert_eq!(beats.len(), 5);
        // natural height of 4/4 is 1, deeper levels are synthesized
        let eighths = meter.offsets_at_depth(2);
        assert_eq!(eighths.len(), 9);
        assert!(eighths.contains(&Fraction::new(3u64, 8u64)));
    }

    #[test]
    fn test_kernel_rejects_bad_denominator() {
        let meter = Meter::new(4, 4);
        assert!(meter.generate_offset_kernel(12, None).is_err());
        assert!(meter.generate_offset_kernel(2, None).is_err());
        assert!(meter.generate_offset_kernel(0, None).is_err());
        assert!(meter.generate_offset_kernel(4, None).is_ok());
    }

    #[test]
    fn test_from_duration() {
        let meter = Meter::from_duration(Fraction::new(3u64, 8u64)).unwrap();
        assert_eq!(meter.numerator(), 3);
        assert_eq!(meter.denominator(), 8);
        assert!(Meter::from_duration(Fraction::from(0.0)).is_err());
    }
}
