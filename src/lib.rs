/*!
 * pfact - semiprime detection over a pipeline of filter stages
 *
 * Decides whether n is prime, the product of exactly two primes, or
 * neither, by growing a chain of concurrent stages:
 * - Each stage removes the multiples of one divisor from the stream 2..=n
 * - A coordinator decides, candidate by candidate, whether the chain grows
 * - The terminal stage publishes the factor pair and its surviving
 *   candidates on two write-once result channels
 * - The number of stages travels back up the chain as an explicit depth
 */

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod output;
pub mod verdict;

// Re-export commonly used types
pub use crate::config::{LogLevel, OutputFormat, PipelineConfig, Schedule};
pub use crate::core::{
    parse_input, run_pipeline, CandidateList, FactorPair, Filter, PipelineOutcome, StageReport,
};
pub use crate::error::{PfactError, Result};
pub use crate::output::{OutputWriter, Report};
pub use crate::verdict::Verdict;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
