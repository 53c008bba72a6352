//! IPC error types and utilities

use thiserror::Error;

/// IPC-specific error types
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to bind socket: {0}")]
    Bind(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Send(String),

    #[error("Failed to receive response: {0}")]
    Receive(String),

    #[error("Malformed frame: {0}")]
    Malformed(#[from] sitter_schema::WireError),

    #[error("Connection closed by peer")]
    ClosedByPeer,

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl IpcError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            IpcError::Bind(_) => "IPC001",
            IpcError::Connect(_) => "IPC002",
            IpcError::Send(_) => "IPC003",
            IpcError::Receive(_) => "IPC004",
            IpcError::Malformed(_) => "IPC005",
            IpcError::ClosedByPeer => "IPC006",
            IpcError::Rejected(_) => "IPC007",
        }
    }
}

/// IPC-specific result type
pub type Result<T> = std::result::Result<T, IpcError>;
