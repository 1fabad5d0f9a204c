/*!
 * A single pipeline stage
 *
 * Each stage runs on its own thread with one divisor. It reads its parent's
 * output, optionally reports the first surviving value back to the
 * coordinator as the next candidate divisor, and then waits to be told its
 * role:
 *
 * - `Relay`: stream the remaining survivors to the child stage, close the
 *   output, wait for the child's depth and report `child + 1` upward.
 * - `Terminal`: publish the factor pair and the surviving candidates on the
 *   result channels, then report a depth of 0 upward.
 */

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, debug_span, error, Span};

use super::channels::{FactorPair, PublishError, ResultPublisher};
use super::filter::{Filter, FilterReport};
use crate::error::{PfactError, Result};

/// Failures inside a stage thread
#[derive(Error, Debug)]
pub enum StageError {
    #[error("coordinator hung up before assigning stage {depth} a role")]
    CoordinatorGone { depth: usize },

    #[error("child of stage {depth} exited without reporting its depth")]
    ChildLost { depth: usize },

    #[error("parent of stage {depth} stopped listening for its depth")]
    ParentGone { depth: usize },

    #[error("downstream of stage {depth} closed while it was streaming")]
    DownstreamClosed { depth: usize },

    #[error("stage {depth} could not publish results: {source}")]
    Publish {
        depth: usize,
        #[source]
        source: PublishError,
    },
}

impl StageError {
    pub fn depth(&self) -> usize {
        match self {
            StageError::CoordinatorGone { depth }
            | StageError::ChildLost { depth }
            | StageError::ParentGone { depth }
            | StageError::DownstreamClosed { depth }
            | StageError::Publish { depth, .. } => *depth,
        }
    }

    /// True when this stage only failed because a neighbour went away
    pub fn is_cascade(&self) -> bool {
        !matches!(self, StageError::Publish { .. })
    }
}

/// Sent by a stage to the coordinator once its first survivor is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageEvent {
    Candidate(u64),
    Exhausted,
}

/// Assigned by the coordinator once it has decided whether the chain grows
pub(crate) enum Role {
    Relay {
        output: Sender<u64>,
        child_depth: Receiver<usize>,
    },
    Terminal {
        candidate: Option<u64>,
        factors: FactorPair,
        publisher: ResultPublisher,
    },
}

/// What a stage ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageRole {
    Relay,
    Terminal,
}

/// Summary returned by a finished stage
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    /// Position in the chain, 1 for the first spawned stage
    pub depth: usize,
    pub divisor: u64,
    pub role: StageRole,
    /// Depth this stage reported to its parent
    pub reported_depth: usize,
    pub filter: FilterReport,
}

/// Channel endpoints a stage owns for its lifetime
pub(crate) struct Stage {
    depth: usize,
    filter: Filter,
    input: Receiver<u64>,
    report_head: bool,
    events: Sender<StageEvent>,
    roles: Receiver<Role>,
    parent_depth: Sender<usize>,
}

impl Stage {
    pub(crate) fn new(
        depth: usize,
        filter: Filter,
        input: Receiver<u64>,
        report_head: bool,
        events: Sender<StageEvent>,
        roles: Receiver<Role>,
        parent_depth: Sender<usize>,
    ) -> Self {
        Self {
            depth,
            filter,
            input,
            report_head,
            events,
            roles,
            parent_depth,
        }
    }

    /// Start the stage on a named thread
    pub(crate) fn spawn(self) -> Result<JoinHandle<std::result::Result<StageReport, StageError>>> {
        let depth = self.depth;
        let parent = Span::current();

        thread::Builder::new()
            .name(format!("pfact-stage-{}", depth))
            .spawn(move || {
                let span = debug_span!(
                    parent: &parent,
                    "stage",
                    depth,
                    divisor = self.filter.divisor()
                );
                let _enter = span.enter();

                let outcome = self.run();
                if let Err(ref e) = outcome {
                    error!(error = %e, "stage failed");
                }
                outcome
            })
            .map_err(|source| PfactError::Spawn { depth, source })
    }

    pub(crate) fn run(self) -> std::result::Result<StageReport, StageError> {
        let Stage {
            depth,
            filter,
            input,
            report_head,
            events,
            roles,
            parent_depth,
        } = self;

        let mut stats = FilterReport::default();

        if report_head {
            let event = match filter.next_survivor(&input, &mut stats) {
                Some(head) => StageEvent::Candidate(head),
                None => StageEvent::Exhausted,
            };
            debug!(?event, "reporting head");
            events
                .send(event)
                .map_err(|_| StageError::CoordinatorGone { depth })?;
        }
        drop(events);

        let role = roles
            .recv()
            .map_err(|_| StageError::CoordinatorGone { depth })?;

        match role {
            Role::Relay {
                output,
                child_depth,
            } => {
                stats.merge(filter.run(&input, &output));
                // Close our end so the child sees end-of-stream
                drop(output);
                drop(input);

                let below = child_depth
                    .recv()
                    .map_err(|_| StageError::ChildLost { depth })?;
                let reported = below + 1;
                debug!(below, reported, "child finished, forwarding depth");

                parent_depth
                    .send(reported)
                    .map_err(|_| StageError::ParentGone { depth })?;

                Ok(StageReport {
                    depth,
                    divisor: filter.divisor(),
                    role: StageRole::Relay,
                    reported_depth: reported,
                    filter: stats,
                })
            }
            Role::Terminal {
                candidate,
                factors,
                publisher,
            } => {
                let mut terminal_stats = FilterReport::default();
                let survivors = input.iter().filter(|value| {
                    let keep = filter.passes(*value);
                    if keep {
                        terminal_stats.forwarded += 1;
                    } else {
                        terminal_stats.dropped += 1;
                    }
                    keep
                });

                let published = publisher
                    .publish(factors, candidate.into_iter().chain(survivors))
                    .map_err(|source| StageError::Publish { depth, source })?;
                stats.merge(terminal_stats);
                debug!(published, ?factors, "published results");

                parent_depth
                    .send(0)
                    .map_err(|_| StageError::ParentGone { depth })?;

                Ok(StageReport {
                    depth,
                    divisor: filter.divisor(),
                    role: StageRole::Terminal,
                    reported_depth: 0,
                    filter: stats,
                })
            }
        }
    }
}
