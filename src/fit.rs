//! Greedy fitting of a meter sequence onto a timeline.

use std::collections::HashMap;

use fraction::Fraction;
use log::debug;

use crate::kernel::{OffsetCounter, OffsetKernel};
use crate::meter::Meter;
use crate::{MeterResult, Offset};

/// Kernel resolution the candidates are compared at by default.
pub const DEFAULT_KERNEL_DENOMINATOR: u64 = 32;

/// Fit an ordered meter sequence onto the tallied timeline.
///
/// `kernel_denominator` defaults to [DEFAULT_KERNEL_DENOMINATOR];
/// `maximum_run_length` caps consecutive repeats of one meter.
///
/// # Example
/// ```
/// # use fraction::Fraction;
/// # use metrum::{fit_meters, Meter, OffsetCounter};
/// let counter = OffsetCounter::from_offsets(
///     (0..5).map(|beat| Fraction::new(beat as u64 * 4, 4u64)),
/// );
/// let meters = fit_meters(
///     counter,
///     vec![Meter::new(3, 4), Meter::new(4, 4), Meter::new(5, 4)],
///     None,
///     None,
/// )
/// .unwrap();
/// assert_eq!(meters, vec![Meter::new(4, 4); 4]);
/// ```
pub fn fit_meters(
    counter: OffsetCounter,
    meters: Vec<Meter>,
    kernel_denominator: impl Into<Option<u64>>,
    maximum_run_length: impl Into<Option<usize>>,
) -> MeterResult<Vec<Meter>> {
    let session =
        MeterFittingSession::new(counter, meters, kernel_denominator, maximum_run_length)?;
    Ok(session.fit())
}

/// Chooses, window by window, the candidate meter whose accent profile
/// responds best to the tallied offsets, with a one-step lookahead.
///
/// Candidates are deduplicated by their generated kernels: two meters
/// with the same accent profile would always score identically, so only
/// one slot is kept (the later meter takes the slot over).
#[derive(Debug)]
pub struct MeterFittingSession {
    maximum_run_length: Option<usize>,
    counter: OffsetCounter,
    candidates: Vec<(OffsetKernel, Meter)>,
    longest: Option<usize>,
}

impl MeterFittingSession {
    pub fn new(
        counter: OffsetCounter,
        meters: Vec<Meter>,
        kernel_denominator: impl Into<Option<u64>>,
        maximum_run_length: impl Into<Option<usize>>,
    ) -> MeterResult<Self> {
        let kernel_denominator = kernel_denominator
            .into()
            .unwrap_or(DEFAULT_KERNEL_DENOMINATOR);
        let maximum_run_length = maximum_run_length.into();
        if let Some(run) = maximum_run_length {
            assert!(run > 0, "maximum_run_length should be positive");
        }
        let mut candidates: Vec<(OffsetKernel, Meter)> = Vec::new();
        for meter in meters {
            let kernel = meter.generate_offset_kernel(kernel_denominator, None)?;
            match candidates.iter().position(|(known, _)| *known == kernel) {
                Some(idx) => candidates[idx].1 = meter,
                None => candidates.push((kernel, meter)),
            }
        }
        let mut longest: Option<usize> = None;
        for (idx, (kernel, _)) in candidates.iter().enumerate() {
            match longest {
                Some(best) if candidates[best].0.duration() > kernel.duration() => {}
                _ => longest = Some(idx),
            }
        }
        Ok(Self {
            maximum_run_length,
            counter,
            candidates,
            longest,
        })
    }

    /// Run the fitting loop over the whole timeline.
    ///
    /// Deterministic for identical inputs and candidate order. An empty
    /// timeline yields an empty sequence.
    pub fn fit(&self) -> Vec<Meter> {
        let maximum_offset = match self.counter.max_offset() {
            Some(offset) => offset,
            None => return Vec::new(),
        };
        let longest = self
            .longest
            .expect("can not fit a timeline without candidate meters");
        let mut windows: HashMap<Offset, OffsetCounter> = HashMap::new();
        let mut selected: Vec<usize> = Vec::new();
        let mut current_offset: Offset = Fraction::from(0.0);
        while current_offset < maximum_offset {
            let allowed = self.allowed_candidates(&selected);
            let window = self.window_at(&mut windows, current_offset);
            let choice = match window.is_empty() {
                // nothing tallied here: repeat the previous choice, or
                // fall back to the longest candidate
                true => selected.last().copied().unwrap_or(longest),
                false => {
                    let mut best: Option<(usize, Fraction)> = None;
                    for idx in allowed.iter().copied() {
                        let response = self.candidates[idx].0.response(&window);
                        let score =
                            response + self.lookahead(&mut windows, current_offset, idx, &allowed);
                        // ties fall to the latest candidate, matching a
                        // stable ascending sort read from the back
                        match &best {
                            Some((_, best_score)) if score < *best_score => {}
                            _ => best = Some((idx, score)),
                        }
                    }
                    let (idx, score) = best.expect("at least one candidate is always allowed");
                    debug!(
                        "offset {current_offset}: selected {} with score {score}",
                        self.candidates[idx].1
                    );
                    idx
                }
            };
            selected.push(choice);
            current_offset = current_offset + self.candidates[choice].0.duration();
        }
        debug_assert!(
            current_offset >= maximum_offset,
            "selected meters should cover the timeline"
        );
        selected
            .into_iter()
            .map(|idx| self.candidates[idx].1.clone())
            .collect()
    }

    /// Candidate indexes not excluded by the run-length cap. A candidate
    /// is dropped only when others exist and the last `maximum_run_length`
    /// selections were all this candidate.
    fn allowed_candidates(&self, selected: &[usize]) -> Vec<usize> {
        let mut allowed: Vec<usize> = (0..self.candidates.len()).collect();
        if let Some(run) = self.maximum_run_length {
            if self.candidates.len() > 1 && selected.len() >= run {
                let tail = &selected[selected.len() - run..];
                let last = tail[0];
                if tail.iter().all(|idx| *idx == last) {
                    allowed.retain(|idx| *idx != last);
                }
            }
        }
        allowed
    }

    /// Sum of every allowed kernel's response at the window following the
    /// scored kernel: rewards choices whose continuation other meters
    /// respond well to.
    fn lookahead(
        &self,
        windows: &mut HashMap<Offset, OffsetCounter>,
        current_offset: Offset,
        scored: usize,
        allowed: &[usize],
    ) -> Fraction {
        let lookahead_offset = current_offset + self.candidates[scored].0.duration();
        let window = self.window_at(windows, lookahead_offset);
        let mut score = Fraction::from(0.0);
        for idx in allowed.iter().copied() {
            score = score + self.candidates[idx].0.response(&window);
        }
        score
    }

    /// Window of tallied offsets in `[start, start + longest kernel]`,
    /// re-based to 0. Windows repeat across candidates, so they are cached
    /// per start offset for the lifetime of one fit call.
    fn window_at(&self, windows: &mut HashMap<Offset, OffsetCounter>, start: Offset) -> OffsetCounter {
        let longest = self
            .longest
            .expect("windows are only requested while fitting");
        let stop = start + self.candidates[longest].0.duration();
        windows
            .entry(start)
            .or_insert_with(|| self.counter.window(start, stop))
            .clone()
    }
}
