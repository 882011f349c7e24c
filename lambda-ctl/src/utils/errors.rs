//! Error taxonomy for lambda-ctl operations.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code used when an operation is interrupted by a signal.
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Error, Debug)]
pub enum CtlError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed manifest {}: {reason}", path.display())]
    MalformedManifest { path: PathBuf, reason: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Malformed tracking record {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("I/O error while {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote function not found: {0}")]
    RemoteNotFound(String),

    #[error("Remote rejected request: {0}")]
    RemoteRejected(String),

    #[error("Remote action not found: {0}")]
    RemoteActionNotFound(String),

    #[error("Remote execution error: {0}")]
    RemoteExecutionError(String),

    #[error("Packaging error: {0}")]
    PackagingError(String),

    #[error("Action '{0}' is not defined in the local action file")]
    LocalActionNotFound(String),

    #[error("Version control init failed: {0}")]
    VersionControlInitFailed(String),

    #[error("{} already tracks {existing}, refusing to track {requested}", dir.display())]
    AlreadyTrackedElsewhere {
        dir: PathBuf,
        existing: String,
        requested: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CtlError {
    /// Returns a mapper that wraps an `io::Error` with the operation and path.
    pub fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CtlError::Io { op, path, source }
    }

    /// Stable name of the failure kind, used in logs and dispatch states.
    pub fn kind(&self) -> &'static str {
        match self {
            CtlError::NotFound(_) => "NotFound",
            CtlError::MalformedManifest { .. } => "MalformedManifest",
            CtlError::InvalidManifest(_) => "InvalidManifest",
            CtlError::MalformedRecord { .. } => "MalformedRecord",
            CtlError::Io { .. } => "IOError",
            CtlError::RemoteUnavailable(_) => "RemoteUnavailable",
            CtlError::RemoteNotFound(_) => "RemoteNotFound",
            CtlError::RemoteRejected(_) => "RemoteRejected",
            CtlError::RemoteActionNotFound(_) => "RemoteActionNotFound",
            CtlError::RemoteExecutionError(_) => "RemoteExecutionError",
            CtlError::PackagingError(_) => "PackagingError",
            CtlError::LocalActionNotFound(_) => "LocalActionNotFound",
            CtlError::VersionControlInitFailed(_) => "VersionControlInitFailed",
            CtlError::AlreadyTrackedElsewhere { .. } => "AlreadyTrackedElsewhere",
            CtlError::Cancelled => "Cancelled",
            CtlError::Config(_) => "Config",
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CtlError::Cancelled => EXIT_CANCELLED,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CtlError>;
