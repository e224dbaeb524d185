//! Error types for the revert engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, reconciling or dispatching a publish log
#[derive(Debug, Error)]
pub enum RevertError {
    /// The log file does not exist
    #[error("log file not found: {}", .0.display())]
    LogNotFound(PathBuf),

    /// The log file exists but could not be read
    #[error("failed to read log file {}: {source}", .path.display())]
    LogRead {
        /// Path that was read
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// A log line is not valid JSON
    #[error("invalid log line {line}: {source}")]
    LogParse {
        /// 1-based line number
        line: usize,
        /// Parser failure
        #[source]
        source: serde_json::Error,
    },

    /// A record does not carry the fields its kind requires
    #[error("malformed log record {index}: {reason}")]
    MalformedRecord {
        /// 0-based record position in the log
        index: usize,
        /// What was missing or wrong
        reason: String,
    },

    /// The first record carries a kind tag that is neither entry nor asset
    #[error("unknown content kind tag: {0}")]
    UnknownKind(String),

    /// The environment directory could not be queried
    #[error("environment lookup failed: {0}")]
    EnvironmentLookup(String),

    /// A queue worker is gone and no longer accepts work
    #[error("{0} queue is closed")]
    QueueClosed(String),

    /// A background dispatch task panicked or was cancelled
    #[error("dispatch task failed: {0}")]
    Dispatch(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, RevertError>;

/// Failure reported by a queue consumer for one job
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The remote call could not be made or was rejected
    #[error("request failed: {0}")]
    Request(String),

    /// Some items of a multi-item job failed
    #[error("{failed} of {total} items failed")]
    Partial {
        /// Items that failed
        failed: usize,
        /// Items in the job
        total: usize,
    },

    /// The job could not be turned into a request
    #[error("invalid job: {0}")]
    InvalidJob(String),
}
