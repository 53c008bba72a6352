//! IPC (Inter-Process Communication) module
//!
//! This crate handles communication between the sitter daemon and its
//! CLI: the sequential command dispatcher on the daemon side and the
//! typed one-shot client on the CLI side.

pub mod client;
pub mod error;
pub mod server;

pub use client::UdsClient;
pub use error::{IpcError, Result};
pub use server::{ControlPlane, IpcServer, IpcServerConfig};
