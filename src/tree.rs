//! Subdivision tree of a meter.
//!
//! Nodes live in an arena and refer to each other by index: children are
//! owned by their container, parent links are plain back-references kept
//! for upward traversal only. Durations stay in written form (2/4 keeps
//! its denominator), so the tree round-trips through [RtmNode] exactly.

use std::collections::BTreeSet;

use fraction::Fraction;

use crate::fraction_tools::{meter_factors, prime_parts};
use crate::rtm::RtmNode;
use crate::{Duration, MeterError, MeterResult, Offset};

/// Index of a node inside its [MeterTree] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, PartialEq, Eq, Clone)]
enum NodeKind {
    Leaf,
    Container { children: Vec<NodeId> },
}

#[derive(Debug, PartialEq, Eq, Clone)]
struct TreeNode {
    numerator: u64,
    denominator: u64,
    parent: Option<NodeId>,
    kind: NodeKind,
}

/// Ordered tree of groupings and beats.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MeterTree {
    nodes: Vec<TreeNode>,
    root: NodeId,
}

impl MeterTree {
    /// Build the canonical subdivision of a time signature by recursive
    /// prime-factor grouping.
    pub fn for_time_signature(
        numerator: u64,
        denominator: u64,
        increase_monotonic: bool,
    ) -> Self {
        assert!(
            numerator > 0 && denominator > 0,
            "time signature members should be positive, got {numerator}/{denominator}"
        );
        let root = TreeNode {
            numerator,
            denominator,
            parent: None,
            kind: NodeKind::Container {
                children: Vec::new(),
            },
        };
        let mut tree = Self {
            nodes: vec![root],
            root: NodeId(0),
        };
        let factors = meter_factors(numerator);
        tree.subdivide(NodeId(0), &factors, denominator, increase_monotonic);
        tree
    }

    /// Import an already-tokenized tree.
    ///
    /// # Returns
    /// Err if the root is a bare leaf, any node has a zero duration, a
    /// grouping is childless, or any grouping does not exactly sum its
    /// children (prolation other than 1).
    pub fn from_rtm(node: &RtmNode) -> MeterResult<Self> {
        match node {
            RtmNode::Leaf { .. } => Err(MeterError::InvalidArgument(format!(
                "root of a meter tree should be a grouping, got leaf {node}"
            ))),
            RtmNode::Container { .. } => {
                let mut tree = Self {
                    nodes: Vec::new(),
                    root: NodeId(0),
                };
                tree.import(None, node)?;
                tree.validate()?;
                Ok(tree)
            }
        }
    }

    fn import(&mut self, parent: Option<NodeId>, node: &RtmNode) -> MeterResult<NodeId> {
        let (numerator, denominator) = node.written();
        if numerator == 0 || denominator == 0 {
            return Err(MeterError::InvalidArgument(format!(
                "zero duration in rtm node {node}"
            )));
        }
        match node {
            RtmNode::Leaf { .. } => Ok(self.push_node(parent, numerator, denominator, NodeKind::Leaf)),
            RtmNode::Container { children, .. } => {
                if children.is_empty() {
                    return Err(MeterError::InvalidArgument(format!(
                        "childless grouping {node}"
                    )));
                }
                let id = self.push_node(
                    parent,
                    numerator,
                    denominator,
                    NodeKind::Container {
                        children: Vec::new(),
                    },
                );
                for child in children {
                    self.import(Some(id), child)?;
                }
                Ok(id)
            }
        }
    }

    fn push_node(
        &mut self,
        parent: Option<NodeId>,
        numerator: u64,
        denominator: u64,
        kind: NodeKind,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            numerator,
            denominator,
            parent,
            kind,
        });
        if let Some(parent) = parent {
            match &mut self.nodes[parent.0].kind {
                NodeKind::Container { children } => children.push(id),
                NodeKind::Leaf => panic!("can not attach a child to a leaf"),
            }
        }
        id
    }

    fn add_leaf(&mut self, parent: NodeId, numerator: u64, denominator: u64) -> NodeId {
        self.push_node(Some(parent), numerator, denominator, NodeKind::Leaf)
    }

    fn add_container(&mut self, parent: NodeId, numerator: u64, denominator: u64) -> NodeId {
        self.push_node(
            Some(parent),
            numerator,
            denominator,
            NodeKind::Container {
                children: Vec::new(),
            },
        )
    }

    /// Consume the factor list downwards, splitting equally on 2, 3 and 4
    /// and breaking larger primes into groupings of 3s and 2s.
    fn subdivide(
        &mut self,
        node: NodeId,
        factors: &[u64],
        denominator: u64,
        increase_monotonic: bool,
    ) {
        let (factor, rest) = match factors.split_first() {
            Some((factor, rest)) => (*factor, rest),
            None => {
                // out of factors: the node becomes a run of plain beats
                let count = self.nodes[node.0].numerator;
                for _ in 0..count {
                    self.add_leaf(node, 1, denominator);
                }
                return;
            }
        };
        let unit = self.nodes[node.0].numerator / factor;
        match factor {
            2 | 3 | 4 => {
                for _ in 0..factor {
                    if rest.is_empty() {
                        self.add_leaf(node, 1, denominator);
                    } else {
                        let child = self.add_container(node, unit, denominator);
                        self.subdivide(child, rest, denominator, increase_monotonic);
                    }
                }
            }
            _ => {
                for part in prime_parts(factor, increase_monotonic) {
                    let grouping = self.add_container(node, part * unit, denominator);
                    for _ in 0..part {
                        if rest.is_empty() {
                            self.add_leaf(grouping, 1, denominator);
                        } else {
                            let child = self.add_container(grouping, unit, denominator);
                            self.subdivide(child, rest, denominator, increase_monotonic);
                        }
                    }
                }
            }
        }
    }

    /// Check that every grouping exactly sums its children.
    pub fn validate(&self) -> MeterResult<()> {
        for node in &self.nodes {
            let children = match &node.kind {
                NodeKind::Leaf => continue,
                NodeKind::Container { children } => children,
            };
            let sum = children
                .iter()
                .fold(Fraction::from(0.0), |sum, child| sum + self.duration(*child));
            if sum != Fraction::new(node.numerator, node.denominator) {
                return Err(MeterError::Prolation {
                    numerator: node.numerator,
                    denominator: node.denominator,
                    children_sum: sum,
                });
            }
        }
        Ok(())
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Written pair of the node, unreduced.
    pub fn written(&self, id: NodeId) -> (u64, u64) {
        let node = &self.nodes[id.0];
        (node.numerator, node.denominator)
    }

    pub fn duration(&self, id: NodeId) -> Duration {
        let node = &self.nodes[id.0];
        Fraction::new(node.numerator, node.denominator)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Leaf => &[],
            NodeKind::Container { children } => children,
        }
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Leaf)
    }

    /// Distance from the root, following parent links.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// All nodes in pre-order, children left to right.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// Pre-order nodes with the offset each one starts at.
    pub fn start_offsets(&self) -> Vec<(NodeId, Offset)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, Fraction::from(0.0))];
        while let Some((id, start)) = stack.pop() {
            order.push((id, start));
            let mut child_start = start + self.duration(id);
            for child in self.children(id).iter().rev() {
                child_start = child_start - self.duration(*child);
                stack.push((*child, child_start));
            }
        }
        order
    }

    pub fn height(&self) -> usize {
        self.preorder()
            .into_iter()
            .map(|id| self.depth(id))
            .max()
            .unwrap_or(0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::Leaf))
            .count()
    }

    pub fn total_duration(&self) -> Duration {
        self.duration(self.root)
    }

    /// Sorted node-start offsets per depth, each level carrying over all
    /// offsets of the levels above it, always including 0 and the total
    /// duration.
    pub fn depthwise_start_offsets(&self) -> Vec<Vec<Offset>> {
        let starts = self.start_offsets();
        let mut all: BTreeSet<Offset> = BTreeSet::new();
        all.insert(Fraction::from(0.0));
        all.insert(self.total_duration());
        let mut inventory = Vec::with_capacity(self.height() + 1);
        for depth in 0..=self.height() {
            for (id, start) in &starts {
                if self.depth(*id) == depth {
                    all.insert(*start);
                }
            }
            inventory.push(all.iter().copied().collect());
        }
        inventory
    }

    /// Export back to the tokenized tree form.
    pub fn to_rtm(&self) -> RtmNode {
        self.rtm_node(self.root)
    }

    fn rtm_node(&self, id: NodeId) -> RtmNode {
        let (numerator, denominator) = self.written(id);
        if self.is_leaf(id) {
            RtmNode::leaf(numerator, denominator)
        } else {
            let children = self
                .children(id)
                .iter()
                .map(|child| self.rtm_node(*child))
                .collect();
            RtmNode::container(numerator, denominator, children)
        }
    }
}

#[cfg(test)]
mod tests {
    use fraction::Fraction;

    use super::MeterTree;
    use crate::rtm::RtmNode;

    #[test]
    fn test_leaves_cover_the_signature() {
        for numerator in 1..=15u64 {
            for denominator in [4u64, 8] {
                let tree = MeterTree::for_time_signature(numerator, denominator, false);
                assert_eq!(tree.leaf_count() as u64, numerator);
                let leaf_sum = tree
                    .preorder()
                    .into_iter()
                    .filter(|id| tree.is_leaf(*id))
                    .fold(Fraction::from(0.0), |sum, id| sum + tree.duration(id));
                assert_eq!(leaf_sum, Fraction::new(numerator, denominator));
                tree.validate().expect("canonical trees are well-formed");
            }
        }
    }

    #[test]
    fn test_seven_four_shape() {
        let tree = MeterTree::for_time_signature(7, 4, false);
        let root = tree.root();
        let written: Vec<_> = tree
            .children(root)
            .iter()
            .map(|id| tree.written(*id))
            .collect();
        assert_eq!(written, vec![(3, 4), (2, 4), (2, 4)]);
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn test_parent_links() {
        let tree = MeterTree::for_time_signature(6, 8, false);
        let root = tree.root();
        assert_eq!(tree.parent(root), None);
        for id in tree.preorder() {
            for child in tree.children(id) {
                assert_eq!(tree.parent(*child), Some(id));
            }
        }
    }

    #[test]
    fn test_depthwise_offsets_refine() {
        let tree = MeterTree::for_time_signature(6, 8, false);
        let inventory = tree.depthwise_start_offsets();
        assert_eq!(
            inventory[0],
            vec![Fraction::from(0.0), Fraction::new(6u64, 8u64)]
        );
        assert_eq!(
            inventory[1],
            vec![
                Fraction::from(0.0),
                Fraction::new(3u64, 8u64),
                Fraction::new(6u64, 8u64),
            ]
        );
        for pair in inventory.windows(2) {
            for offset in &pair[0] {
                assert!(pair[1].contains(offset));
            }
        }
    }

    #[test]
    fn test_import_rejects_bad_prolation() {
        let node = RtmNode::container(4, 4, vec![RtmNode::leaf(1, 4), RtmNode::leaf(1, 4)]);
        assert!(MeterTree::from_rtm(&node).is_err());
    }

    #[test]
    fn test_rtm_round_trip() {
        let tree = MeterTree::for_time_signature(7, 4, false);
        let rebuilt = MeterTree::from_rtm(&tree.to_rtm()).expect("export is well-formed");
        assert_eq!(tree, rebuilt);
    }
}
