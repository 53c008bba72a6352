//! Core error types and utilities

use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Failed to signal process: {0}")]
    Signal(String),

    #[error("Failed to wait for process: {0}")]
    Wait(String),

    #[error("No managed process with pid {0}")]
    UnknownPid(u32),

    #[error("Supervisor is already shutting down")]
    AlreadyStopping,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "SIT001",
            CoreError::Setup(_) => "SIT002",
            CoreError::Spawn(_) => "SIT003",
            CoreError::Signal(_) => "SIT004",
            CoreError::Wait(_) => "SIT005",
            CoreError::UnknownPid(_) => "SIT006",
            CoreError::AlreadyStopping => "SIT007",
            CoreError::Io(_) => "SIT008",
        }
    }

    /// Whether the error is confined to a single request
    ///
    /// Per-request errors are answered with an `Err` response and the
    /// daemon keeps running; everything else aborts startup.
    pub fn is_per_request(&self) -> bool {
        matches!(
            self,
            CoreError::Spawn(_)
                | CoreError::Signal(_)
                | CoreError::UnknownPid(_)
                | CoreError::AlreadyStopping
        )
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::Config("x".to_string()).code(), "SIT001");
        assert_eq!(CoreError::Spawn("x".to_string()).code(), "SIT003");
        assert_eq!(CoreError::UnknownPid(9).code(), "SIT006");
        assert_eq!(CoreError::AlreadyStopping.code(), "SIT007");
    }

    #[test]
    fn test_error_display() {
        let error = CoreError::UnknownPid(1234);
        assert_eq!(error.to_string(), "No managed process with pid 1234");
    }

    #[test]
    fn test_per_request_classification() {
        assert!(CoreError::Spawn("enomem".to_string()).is_per_request());
        assert!(CoreError::UnknownPid(1).is_per_request());
        assert!(!CoreError::Setup("bind".to_string()).is_per_request());
        assert!(!CoreError::Config("bad toml".to_string()).is_per_request());
    }
}
