/*!
 * Pipeline coordinator
 *
 * The root runs one decision loop for the whole chain. For each candidate
 * divisor it either records a factor and grows the chain by one stage, or
 * stops and assigns the terminal role to the newest stage. Stage handles are
 * kept in a vector grown on demand; no stage spawns another.
 *
 * The root streams 2..=n into the first stage from a source thread. After the
 * terminal role is assigned, depth values travel back up the chain on one
 * channel per adjacent pair, and the root reads the result channels only once
 * the first stage has reported.
 */

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, info_span};

use super::channels::{result_channels, CandidateList, FactorPair, ResultPublisher};
use super::filter::Filter;
use super::stage::{Role, Stage, StageError, StageEvent, StageReport};
use crate::config::{PipelineConfig, Schedule};
use crate::error::{PfactError, Result};

/// First divisor tried by every run
pub const FIRST_CANDIDATE: u64 = 2;

/// Smallest accepted input
pub const MIN_INPUT: u64 = 2;

/// Everything the root holds once the chain has unwound
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub n: u64,
    pub schedule: Schedule,
    pub factors: FactorPair,
    pub candidates: CandidateList,
    /// 1 + the depth reported by the first stage (1 when the root was terminal)
    pub stage_count: usize,
    /// Per-stage reports ordered by depth
    pub stages: Vec<StageReport>,
}

/// Summary of the source thread that fed the first stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub emitted: u64,
}

/// Parse the command-line value of n
pub fn parse_input(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    let n: u64 = trimmed
        .parse()
        .map_err(|e| PfactError::Usage(format!("'{}' is not a valid n: {}", trimmed, e)))?;

    if n < MIN_INPUT {
        return Err(PfactError::Usage(format!(
            "n must be at least {}, got {}",
            MIN_INPUT, n
        )));
    }
    Ok(n)
}

/// Whether `m * m <= n`, treating overflow as exceeding n
pub fn square_within(m: u64, n: u64) -> bool {
    m.checked_mul(m).is_some_and(|square| square <= n)
}

/// Run the whole pipeline for `n`
pub fn run_pipeline(n: u64, config: &PipelineConfig) -> Result<PipelineOutcome> {
    if n < MIN_INPUT {
        return Err(PfactError::Usage(format!(
            "n must be at least {}, got {}",
            MIN_INPUT, n
        )));
    }
    config.validate()?;

    let span = info_span!("pipeline", n, schedule = %config.schedule);
    let _enter = span.enter();

    Coordinator::new(n, config).run()
}

/// Coordinator-side handle to a running stage
struct StageHandle {
    depth: usize,
    divisor: u64,
    roles: Sender<Role>,
    events: Receiver<StageEvent>,
    join: JoinHandle<std::result::Result<StageReport, StageError>>,
}

struct Coordinator<'a> {
    n: u64,
    config: &'a PipelineConfig,
    stages: Vec<StageHandle>,
    source: Option<JoinHandle<std::result::Result<SourceReport, StageError>>>,
    root_depth: Option<Receiver<usize>>,
}

impl<'a> Coordinator<'a> {
    fn new(n: u64, config: &'a PipelineConfig) -> Self {
        Self {
            n,
            config,
            stages: Vec::new(),
            source: None,
            root_depth: None,
        }
    }

    fn run(mut self) -> Result<PipelineOutcome> {
        match self.drive() {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.abort(e)),
        }
    }

    fn drive(&mut self) -> Result<PipelineOutcome> {
        let start = Instant::now();
        let capacity = usize::try_from(self.n).map_err(|_| {
            PfactError::Resource(format!("n = {} exceeds the addressable buffer size", self.n))
        })?;
        // Fail before any stage exists if the buffer cannot be had
        let mut candidates = CandidateList::with_capacity(capacity)?;
        let (publisher, collector) = result_channels();

        info!(n = self.n, "starting pipeline");

        let mut factors = FactorPair::new();
        let mut candidate = Some(FIRST_CANDIDATE);

        let terminal_candidate = loop {
            let Some(m) = candidate else {
                debug!("newest stage produced no survivors");
                break None;
            };

            if !square_within(m, self.n) {
                break Some(m);
            }
            factors.record(self.n, m);
            debug!(candidate = m, ?factors, "candidate decided");
            if factors.is_complete() {
                break Some(m);
            }

            self.grow(m)?;
            candidate = self.next_candidate(m)?;
        };

        self.terminate(terminal_candidate, factors, publisher)?;
        let depth = self.await_depth()?;
        let stages = self.join_all()?;

        let factors = collector.collect_into(&mut candidates)?;
        let stage_count = depth + 1;

        info!(
            n = self.n,
            stage_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pipeline finished"
        );

        Ok(PipelineOutcome {
            n: self.n,
            schedule: self.config.schedule,
            factors,
            candidates,
            stage_count,
            stages,
        })
    }

    /// Spawn a stage filtering by `divisor` behind the current newest stage
    fn grow(&mut self, divisor: u64) -> Result<()> {
        if self.stages.len() >= self.config.max_stages {
            return Err(PfactError::Resource(format!(
                "stage limit of {} reached before a verdict",
                self.config.max_stages
            )));
        }

        let depth = self.stages.len() + 1;
        let (output, input) = bounded(self.config.channel_capacity);
        let (depth_tx, depth_rx) = bounded(1);
        let (events_tx, events_rx) = bounded(1);
        let (roles_tx, roles_rx) = bounded(1);

        let join = Stage::new(
            depth,
            Filter::new(divisor),
            input,
            self.config.schedule == Schedule::Survivors,
            events_tx,
            roles_rx,
            depth_tx,
        )
        .spawn()?;

        let handle = StageHandle {
            depth,
            divisor,
            roles: roles_tx,
            events: events_rx,
            join,
        };

        let parent_lost = match self.stages.last() {
            None => {
                self.root_depth = Some(depth_rx);
                self.stages.push(handle);
                self.source = Some(spawn_source(self.n, output)?);
                None
            }
            Some(parent) => {
                let relay = Role::Relay {
                    output,
                    child_depth: depth_rx,
                };
                let lost = parent.roles.send(relay).err().map(|_| parent.depth);
                self.stages.push(handle);
                lost
            }
        };
        if let Some(parent_depth) = parent_lost {
            return Err(self.failure(parent_depth));
        }

        debug!(depth, divisor, "spawned stage");
        Ok(())
    }

    /// Pick the divisor that follows `current`
    fn next_candidate(&mut self, current: u64) -> Result<Option<u64>> {
        match self.config.schedule {
            Schedule::Sequential => Ok(current.checked_add(1)),
            Schedule::Survivors => {
                let (depth, event) = match self.stages.last() {
                    Some(newest) => (newest.depth, newest.events.recv()),
                    None => return Ok(None),
                };
                match event {
                    Ok(StageEvent::Candidate(head)) => Ok(Some(head)),
                    Ok(StageEvent::Exhausted) => Ok(None),
                    Err(_) => Err(self.failure(depth)),
                }
            }
        }
    }

    /// Hand the publisher to the newest stage, or publish directly when no
    /// stage was ever spawned
    fn terminate(
        &mut self,
        candidate: Option<u64>,
        factors: FactorPair,
        publisher: ResultPublisher,
    ) -> Result<()> {
        match self.stages.last() {
            None => {
                debug!(?factors, "root is terminal");
                publisher.publish(factors, FIRST_CANDIDATE..=self.n)?;
                Ok(())
            }
            Some(last) => {
                debug!(depth = last.depth, divisor = last.divisor, ?candidate, "assigning terminal role");
                let depth = last.depth;
                let role = Role::Terminal {
                    candidate,
                    factors,
                    publisher,
                };
                if last.roles.send(role).is_err() {
                    return Err(self.failure(depth));
                }
                Ok(())
            }
        }
    }

    /// Wait for the first stage to report the depth below the root
    fn await_depth(&mut self) -> Result<usize> {
        match self.root_depth.take() {
            None => Ok(0),
            Some(rx) => rx.recv().map_err(|_| self.failure(1)),
        }
    }

    /// Join every stage and the source, surfacing the most telling failure
    fn join_all(&mut self) -> Result<Vec<StageReport>> {
        let mut reports = Vec::with_capacity(self.stages.len());
        let mut failures = FailureLog::default();

        // Release every role sender before blocking on any join, so a stage
        // still waiting for its role cannot hold up its parent
        let handles: Vec<_> = self
            .stages
            .drain(..)
            .map(|stage| (stage.depth, stage.join))
            .collect();

        for (depth, join) in handles {
            match join.join() {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => failures.stage(e),
                Err(_) => failures.panicked(depth, "stage panicked"),
            }
        }

        if let Some(source) = self.source.take() {
            match source.join() {
                Ok(Ok(report)) => debug!(emitted = report.emitted, "source finished"),
                Ok(Err(e)) => failures.stage(e),
                Err(_) => failures.panicked(0, "source panicked"),
            }
        }

        match failures.into_error() {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    /// Unwind whatever is still running, keeping `err` as the reported cause
    fn abort(&mut self, err: PfactError) -> PfactError {
        if let Err(cascade) = self.join_all() {
            debug!(error = %cascade, "stages unwound after failure");
        }
        err
    }

    /// Join everything after a protocol break and return the root cause
    fn failure(&mut self, depth: usize) -> PfactError {
        match self.join_all() {
            Err(e) => e,
            Ok(_) => self.lost(depth),
        }
    }

    fn lost(&self, depth: usize) -> PfactError {
        PfactError::StageFailed {
            depth,
            reason: "stage exited before completing the protocol".to_string(),
        }
    }
}

/// Picks the failure to report when several stages end badly.
///
/// One broken stage makes its neighbours fail too (a parent loses its
/// child, a child loses its parent), so a root cause such as a panic or a
/// publish failure wins over those, and among the rest the deepest wins.
#[derive(Default)]
struct FailureLog {
    root_cause: Option<PfactError>,
    cascade: Option<(usize, PfactError)>,
}

impl FailureLog {
    fn stage(&mut self, err: StageError) {
        if err.is_cascade() {
            let depth = err.depth();
            if self.cascade.as_ref().map_or(true, |(d, _)| depth > *d) {
                self.cascade = Some((depth, PfactError::from(err)));
            }
        } else {
            self.root_cause.get_or_insert_with(|| PfactError::from(err));
        }
    }

    fn panicked(&mut self, depth: usize, reason: &str) {
        self.root_cause.get_or_insert_with(|| PfactError::StageFailed {
            depth,
            reason: reason.to_string(),
        });
    }

    fn into_error(self) -> Option<PfactError> {
        self.root_cause.or(self.cascade.map(|(_, err)| err))
    }
}

/// Stream 2..=n into the first stage
fn spawn_source(
    n: u64,
    output: Sender<u64>,
) -> Result<JoinHandle<std::result::Result<SourceReport, StageError>>> {
    let parent = tracing::Span::current();

    thread::Builder::new()
        .name("pfact-source".to_string())
        .spawn(move || {
            let span = tracing::debug_span!(parent: &parent, "source", n);
            let _enter = span.enter();

            let mut report = SourceReport::default();
            for value in FIRST_CANDIDATE..=n {
                output
                    .send(value)
                    .map_err(|_| StageError::DownstreamClosed { depth: 0 })?;
                report.emitted += 1;
            }
            Ok(report)
        })
        .map_err(|source| PfactError::Spawn { depth: 0, source })
}
