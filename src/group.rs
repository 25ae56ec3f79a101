//! Note groups: the opaque units the rewriter splits and fuses.
//!
//! A group covers one span of a voice with a single preprolated duration:
//! a pitched run, a rest run, or a nested span carrying its own time
//! multiplier. Ties between adjacent pitched groups mark where a longer
//! duration was split; coalescing merges them back into one logical unit.

use fraction::Fraction;

use crate::Duration;

/// One span of a voice.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GroupInfo {
    pub length: Duration,
    pub kind: GroupKind,
}

/// The concrete kinds of groups, dispatched by pattern match.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum GroupKind {
    Note(Note),
    Rest,
    Nested(NestedGroup),
}

/// A pitched run. `tie` links the group to the one following it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Note {
    pub midi: u8,
    pub tie: bool,
}

/// A span nested inside the voice with its own time multiplier, e.g. an
/// already-tupletized run. Inner groups live in preprolated time; the
/// outer length of the span is `multiplier * inner sum`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NestedGroup {
    pub multiplier: Fraction,
    pub groups: Vec<GroupInfo>,
}

impl NestedGroup {
    /// Sum of the inner preprolated durations.
    pub fn inner_duration(&self) -> Duration {
        self.groups
            .iter()
            .fold(Fraction::from(0.0), |sum, group| sum + group.length)
    }
}

impl GroupInfo {
    pub fn new(length: Duration, kind: GroupKind) -> Self {
        Self { length, kind }
    }

    pub fn note(length: Duration, midi: u8) -> Self {
        Self::new(length, GroupKind::Note(Note { midi, tie: false }))
    }

    /// A pitched group tied to its successor.
    pub fn tied_note(length: Duration, midi: u8) -> Self {
        Self::new(length, GroupKind::Note(Note { midi, tie: true }))
    }

    pub fn rest(length: Duration) -> Self {
        Self::new(length, GroupKind::Rest)
    }

    /// A nested span; its outer length is derived from the inner groups.
    pub fn nested(multiplier: Fraction, groups: Vec<GroupInfo>) -> Self {
        let nested = NestedGroup { multiplier, groups };
        let length = nested.multiplier * nested.inner_duration();
        Self::new(length, GroupKind::Nested(nested))
    }

    /// Truncate to `left_length` and return the cut-off remainder.
    ///
    /// A pitched run keeps its pitch on both sides and gets a tie between
    /// them; a rest run splits into plain rests.
    ///
    /// # Example
    /// ```
    /// # use fraction::Fraction;
    /// # use metrum::GroupInfo;
    /// let half = Fraction::new(1u64, 2u64);
    /// let quarter = Fraction::new(1u64, 4u64);
    /// let mut group = GroupInfo::note(half, 60);
    /// let head = group.cut_head(quarter);
    /// assert_eq!(group, GroupInfo::tied_note(quarter, 60));
    /// assert_eq!(head, GroupInfo::note(quarter, 60));
    /// ```
    pub fn cut_head(&mut self, left_length: Duration) -> GroupInfo {
        assert!(
            Fraction::from(0.0) < left_length && left_length < self.length,
            "cut point should fall inside the group: {left_length} against {}",
            self.length
        );
        let head_length = self.length - left_length;
        self.length = left_length;
        let head_kind = match &mut self.kind {
            GroupKind::Note(note) => {
                let head = Note {
                    midi: note.midi,
                    tie: note.tie,
                };
                note.tie = true;
                GroupKind::Note(head)
            }
            GroupKind::Rest => GroupKind::Rest,
            GroupKind::Nested(_) => {
                panic!("nested spans are rewritten recursively, not split")
            }
        };
        GroupInfo::new(head_length, head_kind)
    }
}

/// Merge runs the notation ties together back into single logical groups:
/// adjacent rests fuse, a note tied to an equal-pitch note fuses with it.
/// Nested spans never merge.
pub(crate) fn coalesce(groups: Vec<GroupInfo>) -> Vec<GroupInfo> {
    let mut merged: Vec<GroupInfo> = Vec::with_capacity(groups.len());
    for group in groups {
        if let Some(last) = merged.last_mut() {
            let fuse = match (&mut last.kind, &group.kind) {
                (GroupKind::Rest, GroupKind::Rest) => true,
                (GroupKind::Note(previous), GroupKind::Note(next))
                    if previous.tie && previous.midi == next.midi =>
                {
                    previous.tie = next.tie;
                    true
                }
                _ => false,
            };
            if fuse {
                last.length = last.length + group.length;
                continue;
            }
        }
        merged.push(group);
    }
    merged
}
