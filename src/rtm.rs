//! The tokenized tree form of a meter.
//!
//! Durations stay unreduced here (2/4 keeps its written denominator), so
//! the rendered text matches the meter it came from. Tokenizing text back
//! into [RtmNode] is left to callers; this module only consumes and
//! produces the already-parsed tree.

use std::fmt;

use fraction::Fraction;
use itertools::Itertools;

use crate::Duration;

/// One node of the parenthesized meter form.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RtmNode {
    /// Rendered as bare `numerator/denominator`.
    Leaf { numerator: u64, denominator: u64 },
    /// Rendered as `(numerator/denominator (child ...))`.
    Container {
        numerator: u64,
        denominator: u64,
        children: Vec<RtmNode>,
    },
}

impl RtmNode {
    pub fn leaf(numerator: u64, denominator: u64) -> Self {
        Self::Leaf {
            numerator,
            denominator,
        }
    }
    pub fn container(numerator: u64, denominator: u64, children: Vec<RtmNode>) -> Self {
        Self::Container {
            numerator,
            denominator,
            children,
        }
    }

    /// Written pair as it will be rendered, unreduced.
    pub fn written(&self) -> (u64, u64) {
        match self {
            Self::Leaf {
                numerator,
                denominator,
            }
            | Self::Container {
                numerator,
                denominator,
                ..
            } => (*numerator, *denominator),
        }
    }

    pub fn duration(&self) -> Duration {
        let (numerator, denominator) = self.written();
        Fraction::new(numerator, denominator)
    }

    /// Canonical one-line form.
    ///
    /// # Example
    /// ```
    /// # use metrum::rtm::RtmNode;
    /// let node = RtmNode::container(
    ///     2,
    ///     4,
    ///     vec![RtmNode::leaf(1, 4), RtmNode::leaf(1, 4)],
    /// );
    /// assert_eq!(node.render(), "(2/4 (1/4 1/4))");
    /// ```
    pub fn render(&self) -> String {
        match self {
            Self::Leaf {
                numerator,
                denominator,
            } => format!("{numerator}/{denominator}"),
            Self::Container {
                numerator,
                denominator,
                children,
            } => {
                let inner = children.iter().map(|child| child.render()).join(" ");
                format!("({numerator}/{denominator} ({inner}))")
            }
        }
    }

    /// Indented multi-line form, one leaf per line.
    pub fn render_pretty(&self) -> String {
        self.pretty_lines(0).join("\n")
    }

    fn pretty_lines(&self, indent: usize) -> Vec<String> {
        let pad = "    ".repeat(indent);
        match self {
            Self::Leaf {
                numerator,
                denominator,
            } => vec![format!("{pad}{numerator}/{denominator}")],
            Self::Container {
                numerator,
                denominator,
                children,
            } => {
                let mut lines = vec![format!("{pad}({numerator}/{denominator} (")];
                for child in children {
                    lines.extend(child.pretty_lines(indent + 1));
                }
                let last = lines.last_mut().expect("container renders its own head");
                last.push_str("))");
                lines
            }
        }
    }
}

impl fmt::Display for RtmNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
