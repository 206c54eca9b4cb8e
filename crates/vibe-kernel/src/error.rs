//! Kernel error types.
//!
//! These are failures of the kernel itself, never of the user's code: a
//! guest error is an outcome, reported in an [`crate::ExecuteReply`].

use thiserror::Error;

/// Internal kernel failure.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A capture scope was opened while another was still active.
    #[error("output capture is already active")]
    CaptureActive,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
