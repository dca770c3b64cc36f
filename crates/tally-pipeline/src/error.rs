//! Error types for pipeline passes.

use tally_core::CoreError;
use thiserror::Error;

/// Result type alias using `PipelineError`.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors a pipeline pass can surface to its scheduler.
///
/// Per-item failures inside a pass are logged and absorbed; only failures
/// that abort a whole pass (typically the initial fetch) become errors,
/// and the scheduler answers those by waiting for the next tick.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] CoreError),
}
