/*!
 * Result channels between the terminal stage and the root
 *
 * Two channels bypass the stage chain: one carries the factor pair (exactly
 * two values), the other carries the terminal stage's surviving candidates
 * until it is closed. They are opened once by the root, which keeps the
 * reading half. The writing half is a [`ResultPublisher`] that is moved into
 * whichever stage turns out to be terminal and is consumed by
 * [`ResultPublisher::publish`], so the results are written at most once.
 */

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::Serialize;
use thiserror::Error;

use crate::error::{PfactError, Result};

/// Sentinel for a factor slot that has not been filled
pub const UNSET: u64 = 0;

/// Number of values carried by the factor channel
pub const FACTOR_SLOTS: usize = 2;

/// Errors raised while writing the result channels
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("factor channel closed before the pair was written")]
    FactorChannelClosed,

    #[error("candidate channel closed after {written} values")]
    CandidateChannelClosed { written: usize },
}

/// The two factors of n discovered by the pipeline, 0 meaning unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FactorPair {
    first: u64,
    second: u64,
}

impl FactorPair {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pair from raw slot values as read off the factor channel
    pub fn from_slots(first: u64, second: u64) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> Option<u64> {
        (self.first != UNSET).then_some(self.first)
    }

    pub fn second(&self) -> Option<u64> {
        (self.second != UNSET).then_some(self.second)
    }

    pub fn slots(&self) -> [u64; FACTOR_SLOTS] {
        [self.first, self.second]
    }

    /// Both slots filled; no further divisor is searched for
    pub fn is_complete(&self) -> bool {
        self.second != UNSET
    }

    /// Record candidate `m` against `n`.
    ///
    /// `m * m == n` fills both slots with `m`. Otherwise a divisor fills the
    /// first empty slot.
    pub fn record(&mut self, n: u64, m: u64) {
        if m.checked_mul(m) == Some(n) {
            self.first = m;
            self.second = m;
        } else if m != 0 && n % m == 0 {
            if self.first == UNSET {
                self.first = m;
            } else {
                self.second = m;
            }
        }
    }
}

/// Fixed-capacity list of the values that survived the final filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    values: Vec<u64>,
    capacity: usize,
}

impl CandidateList {
    /// Allocate room for `capacity` values up front, failing instead of aborting
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut values = Vec::new();
        values.try_reserve_exact(capacity).map_err(|e| {
            PfactError::Resource(format!(
                "cannot allocate candidate buffer for {} values: {}",
                capacity, e
            ))
        })?;
        Ok(Self { values, capacity })
    }

    /// Append a value; returns false once the list is full
    pub fn push(&mut self, value: u64) -> bool {
        if self.values.len() >= self.capacity {
            return false;
        }
        self.values.push(value);
        true
    }

    pub fn contains(&self, value: u64) -> bool {
        self.values.contains(&value)
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl From<Vec<u64>> for CandidateList {
    fn from(values: Vec<u64>) -> Self {
        let capacity = values.len();
        Self { values, capacity }
    }
}

/// Open the factor and candidate channels
pub fn result_channels() -> (ResultPublisher, ResultCollector) {
    let (factor_tx, factor_rx) = bounded(FACTOR_SLOTS);
    // Unbounded: the root only reads after the whole chain has unwound
    let (candidate_tx, candidate_rx) = unbounded();

    (
        ResultPublisher {
            factor_tx,
            candidate_tx,
        },
        ResultCollector {
            factor_rx,
            candidate_rx,
        },
    )
}

/// Write-once handle to the result channels
#[derive(Debug)]
pub struct ResultPublisher {
    factor_tx: Sender<u64>,
    candidate_tx: Sender<u64>,
}

impl ResultPublisher {
    /// Write the factor pair, then every candidate in order, then close both
    /// channels. Returns the number of candidates written.
    pub fn publish<I>(self, factors: FactorPair, candidates: I) -> std::result::Result<usize, PublishError>
    where
        I: IntoIterator<Item = u64>,
    {
        for slot in factors.slots() {
            self.factor_tx
                .send(slot)
                .map_err(|_| PublishError::FactorChannelClosed)?;
        }
        drop(self.factor_tx);

        let mut written = 0;
        for value in candidates {
            self.candidate_tx
                .send(value)
                .map_err(|_| PublishError::CandidateChannelClosed { written })?;
            written += 1;
        }
        Ok(written)
    }
}

/// Root-owned reading half of the result channels
#[derive(Debug)]
pub struct ResultCollector {
    factor_rx: Receiver<u64>,
    candidate_rx: Receiver<u64>,
}

impl ResultCollector {
    /// Read the factor pair and the candidate list into `candidates`.
    ///
    /// Values beyond the list's capacity are drained and discarded.
    pub fn collect_into(self, candidates: &mut CandidateList) -> Result<FactorPair> {
        let mut slots = [UNSET; FACTOR_SLOTS];
        for slot in slots.iter_mut() {
            *slot = self.factor_rx.recv().map_err(|_| {
                PfactError::Channel("factor channel closed before the pair arrived".to_string())
            })?;
        }

        for value in self.candidate_rx.iter() {
            if !candidates.push(value) {
                tracing::warn!(
                    capacity = candidates.capacity(),
                    "candidate list full, discarding remaining values"
                );
                break;
            }
        }

        Ok(FactorPair::from_slots(slots[0], slots[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_square() {
        let mut factors = FactorPair::new();
        factors.record(49, 7);
        assert_eq!(factors.slots(), [7, 7]);
        assert!(factors.is_complete());
    }

    #[test]
    fn test_record_fills_first_then_second() {
        let mut factors = FactorPair::new();
        factors.record(30, 2);
        assert_eq!(factors.first(), Some(2));
        assert_eq!(factors.second(), None);
        assert!(!factors.is_complete());

        factors.record(30, 4);
        assert_eq!(factors.slots(), [2, 0]);

        factors.record(30, 3);
        assert_eq!(factors.slots(), [2, 3]);
        assert!(factors.is_complete());
    }

    #[test]
    fn test_record_non_divisor_is_ignored() {
        let mut factors = FactorPair::new();
        factors.record(13, 2);
        factors.record(13, 3);
        assert_eq!(factors, FactorPair::default());
        assert_eq!(factors.first(), None);
    }

    #[test]
    fn test_record_large_candidate_does_not_overflow() {
        let mut factors = FactorPair::new();
        factors.record(u64::MAX, u64::MAX / 2);
        assert_eq!(factors.first(), None);
    }

    #[test]
    fn test_candidate_list_capacity() {
        let mut list = CandidateList::with_capacity(2).unwrap();
        assert!(list.push(5));
        assert!(list.push(7));
        assert!(!list.push(11));
        assert_eq!(list.as_slice(), &[5, 7]);
        assert!(list.contains(7));
        assert!(!list.contains(11));
    }

    #[test]
    fn test_candidate_list_allocation_failure() {
        let err = CandidateList::with_capacity(usize::MAX).unwrap_err();
        assert!(matches!(err, PfactError::Resource(_)));
    }

    #[test]
    fn test_publish_and_collect() {
        let (publisher, collector) = result_channels();

        let written = publisher
            .publish(FactorPair::from_slots(3, 0), [5, 7, 11, 13])
            .unwrap();
        assert_eq!(written, 4);

        let mut candidates = CandidateList::with_capacity(15).unwrap();
        let factors = collector.collect_into(&mut candidates).unwrap();
        assert_eq!(factors.slots(), [3, 0]);
        assert_eq!(candidates.as_slice(), &[5, 7, 11, 13]);
    }

    #[test]
    fn test_collect_without_publish_fails() {
        let (publisher, collector) = result_channels();
        drop(publisher);

        let mut candidates = CandidateList::with_capacity(4).unwrap();
        let err = collector.collect_into(&mut candidates).unwrap_err();
        assert!(matches!(err, PfactError::Channel(_)));
    }

    #[test]
    fn test_publish_to_closed_collector() {
        let (publisher, collector) = result_channels();
        drop(collector);

        let err = publisher.publish(FactorPair::new(), [2, 3]).unwrap_err();
        assert_eq!(err, PublishError::FactorChannelClosed);
    }

    #[test]
    fn test_collect_truncates_at_capacity() {
        let (publisher, collector) = result_channels();
        publisher.publish(FactorPair::new(), 2..=10).unwrap();

        let mut candidates = CandidateList::with_capacity(3).unwrap();
        collector.collect_into(&mut candidates).unwrap();
        assert_eq!(candidates.as_slice(), &[2, 3, 4]);
    }
}
