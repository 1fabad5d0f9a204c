/*!
 * Verdict for a finished pipeline run
 */

use serde::Serialize;

use crate::core::channels::{CandidateList, FactorPair};

/// One of the three possible answers for n
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// No divisor was found below the square root
    Prime,
    /// n = p * q with p <= q both prime
    Semiprime { p: u64, q: u64 },
    /// Composite with more than two prime factors
    NotSemiprime,
}

impl Verdict {
    /// Decide from the factor pair and the terminal stage's surviving list.
    ///
    /// With a single factor p, the cofactor n / p is only accepted when it
    /// survived every filter, i.e. it appears in `candidates`.
    pub fn decide(n: u64, factors: &FactorPair, candidates: &CandidateList) -> Self {
        match (factors.first(), factors.second()) {
            (None, _) => Verdict::Prime,
            (Some(p), None) => {
                let q = n / p;
                if candidates.contains(q) {
                    Verdict::Semiprime { p, q }
                } else {
                    Verdict::NotSemiprime
                }
            }
            (Some(p), Some(q)) => {
                if p.checked_mul(q) == Some(n) {
                    Verdict::Semiprime { p, q }
                } else {
                    Verdict::NotSemiprime
                }
            }
        }
    }

    /// The one-line textual form for `n`
    pub fn render(&self, n: u64) -> String {
        match self {
            Verdict::Prime => format!("{} is prime", n),
            Verdict::Semiprime { p, q } => format!("{} {} {}", n, p, q),
            Verdict::NotSemiprime => format!("{} is not the product of two primes", n),
        }
    }
}
