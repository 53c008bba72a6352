//! Daemon-level errors
//!
//! Wraps the engine and transport errors so `main` has a single error
//! type to report before exiting.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// Supervisor engine failure
    #[error("Supervisor error: {0}")]
    Core(#[from] sitter_core::CoreError),

    /// Control socket failure
    #[error("IPC error: {0}")]
    Ipc(#[from] sitter_ipc::IpcError),

    /// Background task panicked or was cancelled
    #[error("Task failure: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
