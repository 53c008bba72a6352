//! Schema definitions for sitter
//!
//! This crate contains the shared data structures used across the
//! sitter ecosystem: the wire-level command/response types exchanged
//! between the CLI and the daemon, the process snapshot returned by
//! listings, and the daemon configuration surface. All serde-visible
//! types implement JSON Schema generation for external consumption.

pub mod wire;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use wire::{Command, Response, WireError};

/// Snapshot of one managed process, as returned by a list request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    /// OS process id
    pub pid: u32,
    /// Program path the process was launched with
    pub program: String,
    /// Argument vector, excluding the program name
    pub args: Vec<String>,
    /// Launch time in seconds since the Unix epoch
    pub started_at: u64,
    /// Remaining automatic-restart count
    pub retries_left: u32,
}

/// Configuration structure for the daemon
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Path of the Unix domain socket the daemon listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Default stdout redirection target for launched processes
    #[serde(default)]
    pub stdout_file: Option<PathBuf>,
    /// Default retry budget given to newly launched processes
    #[serde(default)]
    pub default_retries: u32,
    /// Per-process grace period between SIGINT and SIGKILL at shutdown
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Log level for the daemon
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            stdout_file: None,
            default_retries: 0,
            grace_period_ms: default_grace_period_ms(),
            log_level: default_log_level(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/sitter.sock")
}

fn default_grace_period_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}
