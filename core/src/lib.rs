//! Core functionality for the sitter process supervisor
//!
//! This crate contains the supervisor engine shared by the daemon and
//! its tests: the process table and launcher, the signal-driven reaper
//! with its restart policy, and the shutdown sequencer.

pub mod config;
pub mod error;
#[cfg(unix)]
pub mod process;
pub mod supervisor;

// Re-export schema types for convenience
pub use sitter_schema::{DaemonConfig, ProcessInfo};

pub use error::{CoreError, Result};
pub use supervisor::{Supervisor, SupervisorState};

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::Setup(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
