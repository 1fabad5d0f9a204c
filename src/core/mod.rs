/*!
 * Core pipeline: filter, stages, result channels and the coordinator
 */

pub mod channels;
pub mod filter;
pub mod pipeline;
pub mod stage;

pub use channels::{result_channels, CandidateList, FactorPair, ResultCollector, ResultPublisher};
pub use filter::{Filter, FilterReport};
pub use pipeline::{parse_input, run_pipeline, PipelineOutcome, FIRST_CANDIDATE, MIN_INPUT};
pub use stage::{StageError, StageReport, StageRole};
