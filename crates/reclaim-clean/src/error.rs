//! Error types for planning and execution.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that reject a whole planning or commit request.
///
/// Per-target failures never surface here; they are outcomes in the
/// [`CleaningResult`](crate::CleaningResult).
#[derive(Debug, Error)]
pub enum CleanError {
    /// A preview plan was handed to the executor.
    #[error("Plan was built in preview mode and cannot be executed")]
    PreviewOnly,

    /// Planning observed its cancellation signal.
    #[error("Planning cancelled")]
    Cancelled,

    /// The background commit task failed to run.
    #[error("Commit task failed: {message}")]
    Task { message: String },
}

/// Errors from calling the privileged helper.
#[derive(Debug, Error)]
pub enum HelperError {
    /// No helper command is configured.
    #[error("No privileged helper configured")]
    Unavailable,

    /// The helper process could not be started.
    #[error("Cannot start helper {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The helper exited unsuccessfully.
    #[error("Helper exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    /// The helper's output was not a valid response.
    #[error("Invalid helper response: {source}")]
    Protocol {
        #[from]
        source: serde_json::Error,
    },

    /// The helper refused a path.
    #[error("Helper refused {path}: {message}")]
    Refused { path: PathBuf, message: String },
}
