/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::path::Path;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::PipelineConfig;
use crate::error::{PfactError, Result};

/// Resolve the effective level, with `verbose` forcing DEBUG
pub fn effective_level(config: &PipelineConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Initialize structured logging based on configuration
pub fn init_logging(config: &PipelineConfig) -> Result<()> {
    let log_level = effective_level(config);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("pfact={}", log_level)))
        .map_err(|e| PfactError::Config(format!("Failed to create log filter: {}", e)))?;

    if let Some(ref log_path) = config.log_file {
        init_file_logging(log_path, env_filter)?;
    } else {
        init_stderr_logging(env_filter)?;
    }

    Ok(())
}

/// Initialize logging to stderr, keeping stdout for the report
fn init_stderr_logging(env_filter: EnvFilter) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| PfactError::Config(format!("Failed to install subscriber: {}", e)))
}

/// Initialize JSON logging to a file
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path).map_err(|e| {
        PfactError::Config(format!(
            "Failed to create log file {}: {}",
            log_path.display(),
            e
        ))
    })?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stage_json_layer(file))
        .try_init()
        .map_err(|e| PfactError::Config(format!("Failed to install subscriber: {}", e)))
}

/// JSON layer where every event carries the pipeline and stage span it
/// was emitted from, so interleaved stage threads can be told apart
fn stage_json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .json()
        .with_current_span(true)
        .with_span_list(true)
}

/// Route test output through the harness writer; safe to call from every test
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pfact=debug")),
            )
            .with_test_writer()
            .with_thread_names(true)
            .compact()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_level_is_warn() {
        let config = PipelineConfig::default();
        assert_eq!(effective_level(&config), Level::WARN);
    }

    #[test]
    fn test_verbose_overrides_log_level() {
        let config = PipelineConfig {
            log_level: LogLevel::Error,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), Level::WARN);
        assert_eq!(LogLevel::Info.to_tracing_level(), Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), Level::DEBUG);
        assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
    }

    #[test]
    fn test_unwritable_log_file_is_config_error() {
        let config = PipelineConfig {
            log_file: Some("/nonexistent-dir/pfact/run.log".into()),
            ..Default::default()
        };
        assert!(matches!(init_logging(&config), Err(PfactError::Config(_))));
    }

    #[test]
    fn test_file_layer_tags_events_with_stage_span() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let writer = file.reopen().unwrap();
        let subscriber = tracing_subscriber::registry().with(stage_json_layer(writer));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::debug_span!("stage", depth = 3u64, divisor = 5u64);
            let _enter = span.enter();
            tracing::warn!("downstream closed");
        });

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let event = contents
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .find(|value| value["fields"]["message"] == "downstream closed")
            .expect("event line missing");
        assert_eq!(event["span"]["name"], "stage");
        assert_eq!(event["span"]["depth"], 3);
        assert_eq!(event["span"]["divisor"], 5);
        assert_eq!(event["spans"].as_array().unwrap().len(), 1);
    }
}
