/*!
 * Divisibility filter applied by every pipeline stage
 *
 * A filter removes the multiples of one divisor from a candidate stream.
 * It holds no state beyond the divisor; the counters it produces are
 * returned to the caller in a [`FilterReport`].
 */

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use tracing::{trace, warn};

/// Removes multiples of `divisor` from a stream of candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    divisor: u64,
}

/// Counters accumulated while a filter drains its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    /// Values written downstream
    pub forwarded: u64,
    /// Values removed as multiples of the divisor
    pub dropped: u64,
    /// Values that passed but could not be written
    pub write_failures: u64,
}

impl FilterReport {
    /// True when no surviving value was lost
    pub fn is_clean(&self) -> bool {
        self.write_failures == 0
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: FilterReport) {
        self.forwarded += other.forwarded;
        self.dropped += other.dropped;
        self.write_failures += other.write_failures;
    }
}

impl Filter {
    /// Create a filter for `divisor`; divisors below 2 are meaningless
    pub fn new(divisor: u64) -> Self {
        debug_assert!(divisor >= 2, "filter divisor must be at least 2");
        Self { divisor }
    }

    pub fn divisor(&self) -> u64 {
        self.divisor
    }

    /// Whether `value` survives this filter
    #[inline]
    pub fn passes(&self, value: u64) -> bool {
        value % self.divisor != 0
    }

    /// Pull values from `input` until one survives, counting the rest as dropped.
    ///
    /// Returns `None` once `input` is closed and exhausted.
    pub fn next_survivor(&self, input: &Receiver<u64>, report: &mut FilterReport) -> Option<u64> {
        for value in input.iter() {
            if self.passes(value) {
                return Some(value);
            }
            report.dropped += 1;
        }
        None
    }

    /// Forward every value from `input` that survives into `output`, in order,
    /// until `input` is closed.
    ///
    /// A failed write is counted and the loop keeps draining `input`, so the
    /// upstream producer never blocks on a stage that stopped writing.
    pub fn run(&self, input: &Receiver<u64>, output: &Sender<u64>) -> FilterReport {
        let mut report = FilterReport::default();

        for value in input.iter() {
            if !self.passes(value) {
                report.dropped += 1;
                continue;
            }

            match output.send(value) {
                Ok(()) => report.forwarded += 1,
                Err(_) => {
                    if report.write_failures == 0 {
                        warn!(
                            divisor = self.divisor,
                            value, "downstream closed, discarding surviving candidates"
                        );
                    }
                    report.write_failures += 1;
                }
            }
        }

        trace!(
            divisor = self.divisor,
            forwarded = report.forwarded,
            dropped = report.dropped,
            "filter input exhausted"
        );
        report
    }
}
