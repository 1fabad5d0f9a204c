//! Report writer supporting human-readable and JSON modes.

use serde::Serialize;
use std::io::Write;

use crate::config::{OutputFormat, Schedule};
use crate::core::{PipelineOutcome, StageReport};
use crate::error::Result;
use crate::verdict::Verdict;

/// Final result of one run, as printed to the user
#[derive(Debug, Serialize)]
pub struct Report {
    pub n: u64,
    pub verdict: Verdict,
    pub factors: [u64; 2],
    pub stage_count: usize,
    pub schedule: Schedule,
    pub stages: Vec<StageReport>,
}

impl Report {
    pub fn from_outcome(outcome: &PipelineOutcome) -> Self {
        Self {
            n: outcome.n,
            verdict: Verdict::decide(outcome.n, &outcome.factors, &outcome.candidates),
            factors: outcome.factors.slots(),
            stage_count: outcome.stage_count,
            schedule: outcome.schedule,
            stages: outcome.stages.clone(),
        }
    }

    pub fn verdict_line(&self) -> String {
        self.verdict.render(self.n)
    }
}

/// JSON-serializable error line
#[derive(Debug, Serialize)]
struct ErrorLine<'a> {
    error: String,
    category: &'a str,
}

/// Output writer that renders reports in the configured format
#[derive(Debug, Clone)]
pub struct OutputWriter {
    pub mode: OutputFormat,
}

impl OutputWriter {
    pub fn new(mode: OutputFormat) -> Self {
        Self { mode }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputFormat::Json
    }

    /// Render a report without printing it
    pub fn render(&self, report: &Report) -> Result<String> {
        match self.mode {
            OutputFormat::Json => Ok(serde_json::to_string(report)?),
            OutputFormat::Human => Ok(format!(
                "{}\nNumber of filters = {}",
                report.verdict_line(),
                report.stage_count
            )),
        }
    }

    /// Print a report to stdout
    pub fn report(&self, report: &Report) -> Result<()> {
        let rendered = self.render(report)?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", rendered)?;
        Ok(())
    }

    /// Print an error message to stderr
    pub fn error(&self, err: &crate::error::PfactError) {
        let msg = sanitize_error(&err.to_string());
        match self.mode {
            OutputFormat::Json => {
                let category = err.category().to_string();
                let line = ErrorLine {
                    error: msg,
                    category: &category,
                };
                if let Ok(json) = serde_json::to_string(&line) {
                    eprintln!("{}", json);
                }
            }
            OutputFormat::Human => {
                eprintln!("Error: {}", msg);
            }
        }
    }
}

/// Sanitize error messages by collapsing whitespace
pub fn sanitize_error(msg: &str) -> String {
    msg.split_whitespace().collect::<Vec<&str>>().join(" ")
}
