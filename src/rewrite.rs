//! Boundary-aware rewriting of note groups against a meter's grid.
//!
//! Groups that can not be notated cleanly at the current subdivision
//! depth are split on grid offsets; groups that can are fused back into
//! single written units. An optional boundary depth forces hard splits at
//! one structural level regardless of notatability.

use fraction::Fraction;
use log::trace;

use crate::fraction_tools::{dot_count, is_assignable};
use crate::group::{coalesce, GroupInfo, GroupKind};
use crate::meter::{synthesize_next_level, Meter};
use crate::Offset;

/// Rewrites one contiguous voice of note groups in place so their
/// boundaries respect the meter's subdivision grid.
#[derive(Debug, Clone)]
pub struct MeterRewriter {
    meter: Meter,
    boundary_depth: Option<usize>,
    maximum_dot_count: Option<u32>,
    initial_offset: Offset,
    prolation: Fraction,
    rewrite_nested: bool,
}

impl MeterRewriter {
    /// The boundary depth starts out as the meter's own preferred one.
    pub fn new(meter: Meter) -> Self {
        let boundary_depth = meter.preferred_boundary_depth();
        Self {
            meter,
            boundary_depth,
            maximum_dot_count: None,
            initial_offset: Fraction::from(0.0),
            prolation: Fraction::from(1.0),
            rewrite_nested: true,
        }
    }

    /// Tree depth whose offsets act as mandatory split points.
    pub fn set_boundary_depth(&mut self, depth: impl Into<Option<usize>>) -> &mut Self {
        self.boundary_depth = depth.into();
        self
    }

    /// Reject written durations carrying more than this many dots.
    pub fn set_maximum_dot_count(&mut self, count: impl Into<Option<u32>>) -> &mut Self {
        let count = count.into();
        if let Some(count) = count {
            assert!(count > 0, "maximum_dot_count should be positive");
        }
        self.maximum_dot_count = count;
        self
    }

    /// Where in the meter the first group starts, in meter coordinates.
    pub fn set_initial_offset(&mut self, offset: Offset) -> &mut Self {
        assert!(
            !offset.is_sign_negative(),
            "initial offset should not be negative, got {offset}"
        );
        self.initial_offset = offset;
        self
    }

    /// Ambient time multiplier of the container the voice sits in; grid
    /// offsets are scaled by it before comparison.
    pub fn set_prolation(&mut self, prolation: Fraction) -> &mut Self {
        assert!(
            Fraction::from(0.0) < prolation,
            "prolation should be positive, got {prolation}"
        );
        self.prolation = prolation;
        self
    }

    /// Whether nested spans are rewritten against their own sub-meters.
    pub fn set_rewrite_nested(&mut self, rewrite: bool) -> &mut Self {
        self.rewrite_nested = rewrite;
        self
    }

    /// Rewrite the voice in place.
    ///
    /// The groups must be contiguous and must fit inside the meter's span
    /// starting from the initial offset (checked). Rewriting an already
    /// conformant voice changes nothing.
    pub fn rewrite(&self, groups: &mut Vec<GroupInfo>) {
        if groups.is_empty() {
            return;
        }
        assert!(
            groups
                .iter()
                .all(|group| Fraction::from(0.0) < group.length),
            "group lengths should be positive"
        );
        let total = groups
            .iter()
            .fold(Fraction::from(0.0), |sum, group| sum + group.length);
        assert!(
            self.initial_offset + total <= self.meter.duration(),
            "groups should fit the meter span: {} + {total} against {}",
            self.initial_offset,
            self.meter.duration()
        );

        let mut inventory: Vec<Vec<Offset>> = self
            .meter
            .depthwise_offset_inventory()
            .iter()
            .map(|level| level.iter().map(|offset| *offset * self.prolation).collect())
            .collect();
        let boundary_offsets = self
            .boundary_depth
            .map(|depth| offsets_at_depth(&mut inventory, depth));

        let logical = coalesce(std::mem::take(groups));
        let mut rewritten = Vec::with_capacity(logical.len());
        let mut cursor = self.initial_offset * self.prolation;
        for group in logical {
            let advance = group.length * self.prolation;
            match group.kind {
                GroupKind::Nested(_) => {
                    let mut group = group;
                    if self.rewrite_nested {
                        self.rewrite_nested_group(&mut group);
                    }
                    rewritten.push(group);
                }
                _ => self.recurse(
                    group,
                    cursor,
                    0,
                    &mut inventory,
                    boundary_offsets.as_deref(),
                    &mut rewritten,
                ),
            }
            cursor = cursor + advance;
        }
        *groups = rewritten;
    }

    fn recurse(
        &self,
        group: GroupInfo,
        start: Offset,
        depth: usize,
        inventory: &mut Vec<Vec<Offset>>,
        boundary_offsets: Option<&[Offset]>,
        rewritten: &mut Vec<GroupInfo>,
    ) {
        let stop = start + group.length * self.prolation;
        let offsets = offsets_at_depth(inventory, depth);
        let starts_on_grid = offsets.binary_search(&start).is_ok();
        let stops_on_grid = offsets.binary_search(&stop).is_ok();
        if !self.is_acceptable(&group, starts_on_grid, stops_on_grid) {
            // split on the grid; prefer the latest point when the start
            // already sits on the grid, the earliest otherwise
            let split_offset = match starts_on_grid {
                true => find_interior(offsets.iter().rev(), start, stop),
                false => find_interior(offsets.iter(), start, stop),
            };
            match split_offset {
                Some(offset) => {
                    trace!("splitting group of {} at {offset}", group.length);
                    self.split_and_recurse(
                        group,
                        start,
                        offset,
                        depth,
                        inventory,
                        boundary_offsets,
                        rewritten,
                    );
                }
                // nothing to split on: look one level deeper
                None => self.recurse(
                    group,
                    start,
                    depth + 1,
                    inventory,
                    boundary_offsets,
                    rewritten,
                ),
            }
        } else if is_boundary_crossing(start, stop, boundary_offsets) {
            let boundary = boundary_offsets.expect("crossing implies boundary offsets");
            let starts_on_boundary = boundary.binary_search(&start).is_ok();
            let split_offset = match starts_on_boundary {
                true => find_interior(boundary.iter().rev(), start, stop),
                false => find_interior(boundary.iter(), start, stop),
            };
            let offset =
                split_offset.expect("a crossing group always holds an interior boundary offset");
            trace!("forcing boundary split of {} at {offset}", group.length);
            self.split_and_recurse(
                group,
                start,
                offset,
                depth,
                inventory,
                boundary_offsets,
                rewritten,
            );
        } else {
            rewritten.push(group);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn split_and_recurse(
        &self,
        mut group: GroupInfo,
        start: Offset,
        split_offset: Offset,
        depth: usize,
        inventory: &mut Vec<Vec<Offset>>,
        boundary_offsets: Option<&[Offset]>,
        rewritten: &mut Vec<GroupInfo>,
    ) {
        let head = group.cut_head((split_offset - start) / self.prolation);
        self.recurse(group, start, depth, inventory, boundary_offsets, rewritten);
        self.recurse(
            head,
            split_offset,
            depth,
            inventory,
            boundary_offsets,
            rewritten,
        );
    }

    /// A group may stay whole iff its duration fits on one written note,
    /// its dots stay under the cap, and it touches the current depth's
    /// grid with at least one end.
    fn is_acceptable(&self, group: &GroupInfo, starts_on_grid: bool, stops_on_grid: bool) -> bool {
        if !is_assignable(group.length) {
            return false;
        }
        if let Some(maximum) = self.maximum_dot_count {
            let dots = dot_count(group.length).expect("assignable durations carry a dot count");
            if maximum < dots {
                return false;
            }
        }
        starts_on_grid || stops_on_grid
    }

    /// Nested spans carry their own grid: a sub-meter built from the
    /// inner preprolated total, with a single forced boundary level when
    /// the outer rewrite forces boundaries at all.
    fn rewrite_nested_group(&self, group: &mut GroupInfo) {
        let nested = match &mut group.kind {
            GroupKind::Nested(nested) => nested,
            _ => return,
        };
        let sub_meter = Meter::from_duration(nested.inner_duration())
            .expect("nested spans have a positive preprolated duration");
        let mut rewriter = MeterRewriter::new(sub_meter);
        rewriter
            .set_boundary_depth(self.boundary_depth.map(|_| 1))
            .set_maximum_dot_count(self.maximum_dot_count)
            .set_rewrite_nested(self.rewrite_nested);
        rewriter.rewrite(&mut nested.groups);
    }
}

/// First offset strictly inside `(start, stop)` in iteration order.
fn find_interior<'a>(
    offsets: impl Iterator<Item = &'a Offset>,
    start: Offset,
    stop: Offset,
) -> Option<Offset> {
    for offset in offsets {
        if start < *offset && *offset < stop {
            return Some(*offset);
        }
    }
    None
}

/// A group crosses a boundary when some boundary offset lies strictly
/// inside it, except when both of its ends sit exactly on boundaries.
fn is_boundary_crossing(start: Offset, stop: Offset, boundary_offsets: Option<&[Offset]>) -> bool {
    let offsets = match boundary_offsets {
        Some(offsets) => offsets,
        None => return false,
    };
    if find_interior(offsets.iter(), start, stop).is_none() {
        return false;
    }
    !(offsets.binary_search(&start).is_ok() && offsets.binary_search(&stop).is_ok())
}

/// Offsets of the inventory level at `depth`, synthesizing levels past
/// the natural tree height on demand.
fn offsets_at_depth(inventory: &mut Vec<Vec<Offset>>, depth: usize) -> Vec<Offset> {
    while inventory.len() <= depth {
        let next = synthesize_next_level(
            inventory
                .last()
                .expect("the inventory always holds the root level"),
        );
        inventory.push(next);
    }
    inventory[depth].clone()
}
