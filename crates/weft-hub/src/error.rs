//! Error types for weft-hub

use thiserror::Error;

/// Result type for weft-hub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in weft-hub
///
/// Task faults are deliberately absent: they are contained per task inside
/// the worker loop and only surface through counters and logs.
#[derive(Debug, Error)]
pub enum Error {
    /// `start` called while a session is active
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// Work submitted while no session is active; the task was dropped
    #[error("scheduler is not running")]
    NotRunning,

    /// The OS refused to create a worker thread
    #[error("failed to spawn worker {index}: {source}")]
    WorkerSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed or rendered
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] weft_core::Error),
}

// Compile-time check that Error is Send + Sync for thread-safe error propagation.
// This function is never called but will fail to compile if the bound is not satisfied.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
