//! Typed UDS client for the sitter daemon
//!
//! One connection per request: connect, write the frame, half-close the
//! write side, read the response to EOF.

use crate::{IpcError, Result};
use sitter_schema::wire::MAX_LISTING;
use sitter_schema::{Command, ProcessInfo, Response};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

// sized to the largest response the daemon will write, a full listing
const MAX_RESPONSE: u64 = 5 + MAX_LISTING as u64;

/// Client for the daemon's command socket
#[derive(Debug, Clone)]
pub struct UdsClient {
    socket_path: PathBuf,
}

impl UdsClient {
    /// Create a client for the given socket path
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Launch a process from a full argument vector (program first)
    pub async fn run(&self, argv: Vec<String>) -> Result<()> {
        self.expect_ok(Command::NewProcess { argv }, "launch refused")
            .await
    }

    /// Deliver a signal to a managed process
    pub async fn signal(&self, pid: i32, signal: i32) -> Result<()> {
        self.expect_ok(
            Command::SignalProcess { signal, pid },
            "signal refused",
        )
        .await
    }

    /// Fetch a snapshot of the process table
    pub async fn list(&self) -> Result<Vec<ProcessInfo>> {
        match self.exchange(&Command::ListProcess).await? {
            Response::Listing(processes) => Ok(processes),
            Response::Ok => Ok(Vec::new()),
            Response::Err => Err(IpcError::Rejected("list refused".to_string())),
        }
    }

    /// Enable or disable automatic restart for a managed process
    pub async fn set_autorestart(&self, pid: i32, enabled: bool) -> Result<()> {
        let command = if enabled {
            Command::EnableAutorestart { pid }
        } else {
            Command::DisableAutorestart { pid }
        };
        self.expect_ok(command, "autorestart change refused").await
    }

    /// Change the stdout redirection target for later launches;
    /// `None` disables redirection
    pub async fn set_stdout(&self, path: Option<&str>) -> Result<()> {
        self.expect_ok(
            Command::SetStdout {
                path: path.map(str::to_string),
            },
            "stdout change refused",
        )
        .await
    }

    /// Ask the daemon to terminate all managed processes and exit
    ///
    /// The daemon acknowledges by closing the connection, so EOF is
    /// success here.
    pub async fn shutdown(&self) -> Result<()> {
        match self.exchange(&Command::Shutdown).await {
            Err(IpcError::ClosedByPeer) => Ok(()),
            Ok(Response::Err) => Err(IpcError::Rejected("shutdown refused".to_string())),
            Ok(other) => Err(IpcError::Rejected(format!(
                "unexpected shutdown response {other:?}"
            ))),
            Err(e) => Err(e),
        }
    }

    async fn expect_ok(&self, command: Command, rejection: &str) -> Result<()> {
        match self.exchange(&command).await? {
            Response::Ok => Ok(()),
            Response::Err => Err(IpcError::Rejected(rejection.to_string())),
            Response::Listing(_) => Err(IpcError::Rejected(
                "unexpected listing response".to_string(),
            )),
        }
    }

    async fn exchange(&self, command: &Command) -> Result<Response> {
        debug!("Connecting to daemon at {}", self.socket_path.display());
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| IpcError::Connect(e.to_string()))?;

        stream
            .write_all(&command.encode())
            .await
            .map_err(|e| IpcError::Send(e.to_string()))?;
        // half-close marks the end of the request frame
        stream
            .shutdown()
            .await
            .map_err(|e| IpcError::Send(e.to_string()))?;

        let mut buf = Vec::new();
        (&mut stream)
            .take(MAX_RESPONSE)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| IpcError::Receive(e.to_string()))?;

        if buf.is_empty() {
            return Err(IpcError::ClosedByPeer);
        }
        Ok(Response::decode(&buf)?)
    }
}
