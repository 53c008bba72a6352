//! Daemon bootstrap
//!
//! Wires the supervisor engine to the control socket: builds the
//! `Supervisor`, spawns the reaper task, and starts the IPC dispatcher
//! with the supervisor mounted behind the `ControlPlane` seam.

use crate::error::{DaemonError, Result};
use async_trait::async_trait;
use sitter_core::supervisor::{reaper, shutdown};
use sitter_core::{config, CoreError, DaemonConfig, ProcessInfo, Supervisor};
use sitter_ipc::{ControlPlane, IpcError, IpcServer, IpcServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Control-plane adapter exposing the supervisor over IPC
///
/// Engine errors become `Rejected` responses: the request fails, the
/// daemon keeps running.
pub struct SupervisorControlPlane {
    supervisor: Arc<Supervisor>,
}

impl SupervisorControlPlane {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }
}

fn reject(err: CoreError) -> IpcError {
    IpcError::Rejected(format!("[{}] {}", err.code(), err))
}

#[async_trait]
impl ControlPlane for SupervisorControlPlane {
    async fn run(&self, argv: Vec<String>) -> sitter_ipc::Result<u32> {
        self.supervisor.launch(argv).await.map_err(reject)
    }

    async fn signal(&self, pid: i32, signal: i32) -> sitter_ipc::Result<()> {
        self.supervisor.signal(pid, signal).await.map_err(reject)
    }

    async fn list(&self) -> sitter_ipc::Result<Vec<ProcessInfo>> {
        Ok(self.supervisor.list().await)
    }

    async fn set_autorestart(&self, pid: i32, enabled: bool) -> sitter_ipc::Result<()> {
        self.supervisor
            .set_autorestart(pid, enabled)
            .await
            .map_err(reject)
    }

    async fn set_stdout(&self, path: Option<PathBuf>) -> sitter_ipc::Result<()> {
        self.supervisor.set_stdout_path(path);
        Ok(())
    }

    async fn shutdown(&self) -> sitter_ipc::Result<()> {
        shutdown::shutdown(&self.supervisor).await.map_err(reject)
    }
}

/// A running daemon: the supervisor plus its dispatcher task
pub struct BootstrapHandle {
    supervisor: Arc<Supervisor>,
    server_task: JoinHandle<sitter_ipc::Result<()>>,
    socket_path: PathBuf,
}

impl BootstrapHandle {
    pub fn supervisor(&self) -> Arc<Supervisor> {
        Arc::clone(&self.supervisor)
    }

    pub fn socket_path(&self) -> &std::path::Path {
        &self.socket_path
    }

    /// Wait for the dispatcher to finish
    ///
    /// Resolves once a `Shutdown` command has been processed and the
    /// dispatcher has unlinked its socket.
    pub async fn join(self) -> Result<()> {
        self.server_task
            .await
            .map_err(|e| DaemonError::Task(e.to_string()))??;
        Ok(())
    }

    /// Run until the dispatcher finishes or a termination signal arrives
    ///
    /// On SIGINT/SIGTERM the child-termination sequence runs first, then
    /// the dispatcher task is cancelled and the socket unlinked; the
    /// signal replaces the `Shutdown` command the dispatcher never saw.
    pub async fn run_until_stopped(mut self) -> Result<()> {
        tokio::select! {
            joined = &mut self.server_task => {
                joined.map_err(|e| DaemonError::Task(e.to_string()))??;
                Ok(())
            }
            _ = termination_signal() => {
                info!("Termination signal received, shutting down");
                match shutdown::shutdown(&self.supervisor).await {
                    Ok(()) | Err(CoreError::AlreadyStopping) => {}
                    Err(e) => warn!("Shutdown failed: {}", e),
                }
                self.server_task.abort();
                let _ = std::fs::remove_file(&self.socket_path);
                Ok(())
            }
        }
    }
}

async fn termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
            unreachable!()
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

/// Validate the configuration and start the daemon
pub async fn bootstrap(config: DaemonConfig) -> Result<BootstrapHandle> {
    config::validate_config(&config)?;
    info!(
        "Starting sitter daemon on {} (retries: {}, grace: {}ms)",
        config.socket_path.display(),
        config.default_retries,
        config.grace_period_ms
    );

    let socket_path = config.socket_path.clone();
    let supervisor = Arc::new(Supervisor::new(config));
    supervisor.attach_reaper(tokio::spawn(reaper::run(Arc::clone(&supervisor))));

    let router = Arc::new(SupervisorControlPlane::new(Arc::clone(&supervisor)));
    let server = IpcServer::new(
        IpcServerConfig {
            socket_path: socket_path.clone(),
        },
        router,
    );
    let server_task = tokio::spawn(async move { server.serve().await });

    Ok(BootstrapHandle {
        supervisor,
        server_task,
        socket_path,
    })
}
