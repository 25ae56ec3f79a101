//! Accent kernels and offset tallies.

use std::collections::BTreeMap;

use fraction::Fraction;

use crate::{Duration, Offset};

/// Accent profile of one meter: offset mapped to rational weight.
///
/// Calling [response](Self::response) against an [OffsetCounter] yields
/// the impulse response, a single rational score of how strongly the
/// tallied points align with the meter's accents.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OffsetKernel {
    weights: BTreeMap<Offset, Fraction>,
    duration: Duration,
}

impl OffsetKernel {
    pub(crate) fn new(weights: BTreeMap<Offset, Fraction>, duration: Duration) -> Self {
        Self { weights, duration }
    }

    pub fn weights(&self) -> &BTreeMap<Offset, Fraction> {
        &self.weights
    }

    /// Span of the meter the kernel was generated from.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Sum of `weight(offset) * count(offset)` over offsets present in
    /// both the kernel and the counter.
    pub fn response(&self, counter: &OffsetCounter) -> Fraction {
        let mut response = Fraction::from(0.0);
        for (offset, count) in counter.iter() {
            if let Some(weight) = self.weights.get(offset) {
                response = response + *weight * Fraction::new(*count as u64, 1u64);
            }
        }
        response
    }
}

/// Multiset of rational offsets drawn from arbitrary time-spanning
/// objects. Purely a tally; it owns nothing of its sources.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct OffsetCounter {
    counts: BTreeMap<Offset, usize>,
}

impl OffsetCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally plain time points.
    pub fn from_offsets(offsets: impl IntoIterator<Item = Offset>) -> Self {
        offsets.into_iter().collect()
    }

    /// Tally the start and stop points of time-spanning objects.
    pub fn from_timespans(spans: impl IntoIterator<Item = (Offset, Offset)>) -> Self {
        spans.into_iter().collect()
    }

    pub fn insert(&mut self, offset: Offset) {
        *self.counts.entry(offset).or_insert(0) += 1;
    }

    pub fn count(&self, offset: &Offset) -> usize {
        self.counts.get(offset).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct offsets.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Offset, &usize)> {
        self.counts.iter()
    }

    pub fn offsets(&self) -> impl Iterator<Item = &Offset> {
        self.counts.keys()
    }

    pub fn max_offset(&self) -> Option<Offset> {
        self.counts.keys().next_back().copied()
    }

    /// Tallied offsets in `[start, stop]`, re-based to start at 0.
    pub(crate) fn window(&self, start: Offset, stop: Offset) -> OffsetCounter {
        let counts = self
            .counts
            .range(start..=stop)
            .map(|(offset, count)| (*offset - start, *count))
            .collect();
        Self { counts }
    }
}

impl FromIterator<Offset> for OffsetCounter {
    fn from_iter<I: IntoIterator<Item = Offset>>(iter: I) -> Self {
        let mut counter = Self::new();
        for offset in iter {
            counter.insert(offset);
        }
        counter
    }
}

impl FromIterator<(Offset, Offset)> for OffsetCounter {
    fn from_iter<I: IntoIterator<Item = (Offset, Offset)>>(iter: I) -> Self {
        let mut counter = Self::new();
        for (start, stop) in iter {
            counter.insert(start);
            counter.insert(stop);
        }
        counter
    }
}
