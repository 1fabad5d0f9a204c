/*!
 * Error types for pfact
 */

use std::fmt;
use std::io;

use crate::core::channels::PublishError;
use crate::core::stage::StageError;

pub type Result<T> = std::result::Result<T, PfactError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USAGE: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// Usage banner printed for every command-line violation
pub const USAGE: &str = "Usage:\n\tpfact n";

#[derive(Debug)]
pub enum PfactError {
    /// Bad command-line input (wrong argument count, non-numeric or out-of-range n)
    Usage(String),

    /// A resource could not be acquired (candidate buffer, stage limit)
    Resource(String),

    /// A stage thread could not be started
    Spawn { depth: usize, source: io::Error },

    /// A pipeline channel closed before its protocol completed
    Channel(String),

    /// A stage terminated abnormally
    StageFailed { depth: usize, reason: String },

    /// Configuration error
    Config(String),

    /// I/O error
    Io(io::Error),
}

impl PfactError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PfactError::Usage(_) => EXIT_USAGE,
            // Every internal failure is fail-fast with the same sentinel
            _ => EXIT_FATAL,
        }
    }

    /// Check if this error should be reported with the usage banner
    pub fn is_usage(&self) -> bool {
        matches!(self, PfactError::Usage(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            PfactError::Usage(_) => ErrorCategory::Usage,
            PfactError::Resource(_) => ErrorCategory::Resource,
            PfactError::Spawn { .. } | PfactError::StageFailed { .. } => {
                ErrorCategory::Concurrency
            }
            PfactError::Channel(_) => ErrorCategory::Channel,
            PfactError::Config(_) => ErrorCategory::Configuration,
            PfactError::Io(_) => ErrorCategory::IoError,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Command-line validation errors
    Usage,
    /// Resource availability errors (memory, thread limits)
    Resource,
    /// Stage lifecycle errors
    Concurrency,
    /// Pipeline channel errors
    Channel,
    /// Configuration errors
    Configuration,
    /// I/O operation errors
    IoError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Usage => write!(f, "usage"),
            ErrorCategory::Resource => write!(f, "resource"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
            ErrorCategory::Channel => write!(f, "channel"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::IoError => write!(f, "io"),
        }
    }
}

impl fmt::Display for PfactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PfactError::Usage(msg) => {
                write!(f, "Invalid input: {}", msg)
            }
            PfactError::Resource(msg) => {
                write!(f, "Resource error: {}", msg)
            }
            PfactError::Spawn { depth, source } => {
                write!(f, "Failed to spawn stage {}: {}", depth, source)
            }
            PfactError::Channel(msg) => {
                write!(f, "Channel error: {}", msg)
            }
            PfactError::StageFailed { depth, reason } => {
                write!(f, "Stage {} failed: {}", depth, reason)
            }
            PfactError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            PfactError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
        }
    }
}

impl std::error::Error for PfactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PfactError::Io(err) => Some(err),
            PfactError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for PfactError {
    fn from(err: io::Error) -> Self {
        PfactError::Io(err)
    }
}

impl From<serde_json::Error> for PfactError {
    fn from(err: serde_json::Error) -> Self {
        PfactError::Config(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for PfactError {
    fn from(err: toml::de::Error) -> Self {
        PfactError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<StageError> for PfactError {
    fn from(err: StageError) -> Self {
        PfactError::StageFailed {
            depth: err.depth(),
            reason: err.to_string(),
        }
    }
}

impl From<PublishError> for PfactError {
    fn from(err: PublishError) -> Self {
        PfactError::Channel(err.to_string())
    }
}
