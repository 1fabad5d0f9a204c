/*!
 * pfact CLI - Command Line Interface
 *
 * Prints whether n is prime, the product of two primes, or neither,
 * followed by the number of filter stages the pipeline created.
 */

use clap::{error::ErrorKind, Parser, ValueEnum};
use pfact::{
    config::{LogLevel, OutputFormat, PipelineConfig, Schedule},
    error::{PfactError, Result, EXIT_SUCCESS, USAGE},
    logging, parse_input, run_pipeline, OutputWriter, Report,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pfact")]
#[command(version, about = "Decide whether n is prime or a product of two primes using a pipeline of filter stages", long_about = None)]
struct Cli {
    /// Integer to examine (at least 2)
    #[arg(value_name = "N", allow_negative_numbers = true)]
    n: String,

    /// Path to a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How the next stage's divisor is chosen
    #[arg(long, value_enum)]
    schedule: Option<ScheduleArg>,

    /// Capacity of each inter-stage channel, in values
    #[arg(long, value_name = "VALUES")]
    channel_capacity: Option<usize>,

    /// Maximum number of stages to spawn
    #[arg(long, value_name = "COUNT")]
    max_stages: Option<usize>,

    /// Print the report as a single JSON object
    #[arg(long)]
    json: bool,

    /// Log level for diagnostic output
    #[arg(long = "log-level", value_enum)]
    log_level: Option<LogLevelArg>,

    /// Write logs to a file (JSON) instead of stderr
    #[arg(long = "log", value_name = "FILE")]
    log: Option<PathBuf>,

    /// Enable verbose logging (equivalent to --log-level=debug)
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ScheduleArg {
    Survivors,
    Sequential,
}

impl From<ScheduleArg> for Schedule {
    fn from(arg: ScheduleArg) -> Self {
        match arg {
            ScheduleArg::Survivors => Schedule::Survivors,
            ScheduleArg::Sequential => Schedule::Sequential,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    // Human until the merged config says otherwise
    let mut format = OutputFormat::Human;
    let code = match run(&mut format) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            if e.is_usage() {
                eprintln!("{}", USAGE);
            }
            OutputWriter::new(format).error(&e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(format: &mut OutputFormat) -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }
        Err(e) => return Err(PfactError::Usage(clap_message(&e))),
    };

    if cli.json {
        *format = OutputFormat::Json;
    }

    let config = build_config(&cli)?;
    *format = config.output;

    logging::init_logging(&config)?;

    let n = parse_input(&cli.n)?;
    let outcome = run_pipeline(n, &config)?;

    OutputWriter::new(config.output).report(&Report::from_outcome(&outcome))
}

/// First line of a clap error, without its "error: " prefix
fn clap_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let line = rendered.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).to_string()
}

/// Merge the config file (if any) with command-line overrides
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match cli.config {
        Some(ref path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(schedule) = cli.schedule {
        config.schedule = schedule.into();
    }
    if let Some(capacity) = cli.channel_capacity {
        config.channel_capacity = capacity;
    }
    if let Some(max_stages) = cli.max_stages {
        config.max_stages = max_stages;
    }
    if cli.json {
        config.output = OutputFormat::Json;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    config.validate()?;
    Ok(config)
}
