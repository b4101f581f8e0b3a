//! Error taxonomy shared by every archive operation.
//!
//! Each variant knows whether it is the caller's fault (`is_client_error`) and which HTTP status
//! the archive service reports for it, so an orchestration layer can map errors without
//! inspecting messages.
//!
//! # Logging Convention
//! `Io` wraps an `anyhow::Error` chain; log it with `{:#}` to keep the full chain:
//! ```ignore
//! error!("compress failed: {:#}", &error);
//! ```

/// Errors raised by the archive engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required listing (remote or local manifest) produced zero usable entries.
    #[error("{0}")]
    EmptyResult(String),
    /// The external listing or transmission command exited non-zero.
    #[error("{message} (exit status: {status:?}). Output: {output}")]
    TransportError {
        message: String,
        status: Option<i32>,
        output: String,
    },
    /// A line of remote listing output could not be understood.
    #[error("malformed listing line {line:?}: {reason}")]
    MalformedListing { line: String, reason: String },
    /// The archive destination already exists and removal was not requested.
    #[error("destination {0:?} already exists (remove=false)")]
    DestinationExists(std::path::PathBuf),
    /// The container file is already present; packing is not additive.
    #[error("container {0:?} already exists")]
    ContainerExists(std::path::PathBuf),
    /// A structurally required subdirectory is missing or not a directory.
    #[error("required directory {required:?} in {source_tree:?} is broken or missing")]
    SourceIncomplete {
        source_tree: std::path::PathBuf,
        required: String,
    },
    /// The named runfolder or archive is not a direct subdirectory of its root.
    #[error("{name} is not found under {root:?}")]
    RunfolderNotFound {
        name: String,
        root: std::path::PathBuf,
    },
    /// The configured log directory is not usable.
    #[error("log directory {0:?} is not a directory")]
    InvalidLogDir(std::path::PathBuf),
    /// The dispatcher does not know the given job id.
    #[error("unknown job id: {0}")]
    UnknownJob(String),
    /// Any other I/O or plumbing failure, with context.
    #[error("{0:#}")]
    Io(#[from] anyhow::Error),
}

impl Error {
    /// True when the error stems from the request rather than the environment.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyResult(_)
                | Error::ContainerExists(_)
                | Error::RunfolderNotFound { .. }
                | Error::UnknownJob(_)
        )
    }

    /// HTTP status the archive service answers with for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Error::UnknownJob(_) => 404,
            _ if self.is_client_error() => 400,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
