//! sitter daemon library
//!
//! Hosts the supervisor engine behind a Unix domain socket. The binary
//! (`sitterd`) parses flags, builds a `DaemonConfig`, and hands it to
//! [`bootstrap`]; tests drive the same entry point in-process.

pub mod bootstrap;
pub mod error;

pub use bootstrap::{bootstrap, BootstrapHandle, SupervisorControlPlane};
pub use error::{DaemonError, Result};
