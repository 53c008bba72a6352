//! Local command dispatcher over a Unix domain socket
//!
//! The server accepts one connection at a time and processes it to
//! completion before the next accept: decode one command, dispatch it
//! through the [`ControlPlane`], write exactly one response, close.
//! Clients half-close their write side after the request, so a frame is
//! simply everything up to EOF, bounded by the protocol's payload
//! limit.
//!
//! Per-request failures (malformed frames, rejected operations) are
//! answered with an `Err` response and the loop continues; only bind
//! errors are fatal.

use crate::{IpcError, Result};
use async_trait::async_trait;
use sitter_schema::wire::{MAX_LISTING, MAX_PAYLOAD};
use sitter_schema::{Command, ProcessInfo, Response};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

/// Largest request frame the dispatcher will read: opcode + length
/// prefix + bounded payload
const MAX_FRAME: u64 = 5 + MAX_PAYLOAD as u64;

/// Largest response frame the dispatcher will write; listings beyond
/// this are answered with an error instead of a frame the client
/// would refuse to read
const MAX_RESPONSE_FRAME: usize = 5 + MAX_LISTING;

/// Operations the dispatcher delegates to the supervisor engine
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Launch a process from a full argument vector; returns the new pid
    async fn run(&self, argv: Vec<String>) -> Result<u32>;
    /// Deliver a signal to a managed process
    async fn signal(&self, pid: i32, signal: i32) -> Result<()>;
    /// Snapshot the process table
    async fn list(&self) -> Result<Vec<ProcessInfo>>;
    /// Set a process's retry budget to the configured value or zero
    async fn set_autorestart(&self, pid: i32, enabled: bool) -> Result<()>;
    /// Change the stdout redirection target for later launches
    async fn set_stdout(&self, path: Option<PathBuf>) -> Result<()>;
    /// Terminate all managed processes and stop the daemon
    async fn shutdown(&self) -> Result<()>;
}

/// Configuration for the dispatcher
#[derive(Debug, Clone)]
pub struct IpcServerConfig {
    /// Unix socket path to listen on
    pub socket_path: PathBuf,
}

/// The command dispatcher
#[allow(missing_debug_implementations)]
pub struct IpcServer {
    config: IpcServerConfig,
    router: Arc<dyn ControlPlane>,
}

impl IpcServer {
    /// Create a dispatcher delegating to the given control plane
    pub fn new(config: IpcServerConfig, router: Arc<dyn ControlPlane>) -> Self {
        Self { config, router }
    }

    /// Serve connections until a shutdown command completes
    ///
    /// Binds the socket (replacing a stale socket file if one is left
    /// over from a previous run), then runs the sequential accept loop.
    /// On return the listener is closed and the socket file removed.
    pub async fn serve(&self) -> Result<()> {
        let path = &self.config.socket_path;

        if path.exists() {
            std::fs::remove_file(path).map_err(|e| {
                IpcError::Bind(format!(
                    "failed to remove existing socket {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!("Removed stale socket at {}", path.display());
        }

        let listener = UnixListener::bind(path)
            .map_err(|e| IpcError::Bind(format!("failed to bind {}: {}", path.display(), e)))?;
        info!("Dispatcher listening at {}", path.display());

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            if self.handle_connection(stream).await {
                break;
            }
        }

        drop(listener);
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove socket {}: {}", path.display(), e);
        }
        info!("Dispatcher stopped");
        Ok(())
    }

    /// Process one connection to completion
    ///
    /// Returns true when a shutdown command was honored and the accept
    /// loop must terminate.
    async fn handle_connection(&self, mut stream: UnixStream) -> bool {
        let mut buf = Vec::new();
        if let Err(e) = (&mut stream).take(MAX_FRAME).read_to_end(&mut buf).await {
            warn!("Failed to read request: {}", e);
            return false;
        }

        let command = match Command::decode(&buf) {
            Ok(command) => command,
            Err(e) => {
                warn!("Malformed request ({} bytes): {}", buf.len(), e);
                write_response(&mut stream, &Response::Err).await;
                return false;
            }
        };
        debug!("Dispatching {:?}", command);

        let response = match command {
            Command::NewProcess { argv } => match self.router.run(argv).await {
                Ok(pid) => {
                    debug!("Launched pid {}", pid);
                    Response::Ok
                }
                Err(e) => {
                    warn!("Launch rejected: {}", e);
                    Response::Err
                }
            },
            Command::SignalProcess { signal, pid } => {
                match self.router.signal(pid, signal).await {
                    Ok(()) => Response::Ok,
                    Err(e) => {
                        warn!("Signal rejected: {}", e);
                        Response::Err
                    }
                }
            }
            Command::ListProcess => match self.router.list().await {
                Ok(processes) => Response::Listing(processes),
                Err(e) => {
                    warn!("List failed: {}", e);
                    Response::Err
                }
            },
            Command::EnableAutorestart { pid } => {
                match self.router.set_autorestart(pid, true).await {
                    Ok(()) => Response::Ok,
                    Err(e) => {
                        warn!("Enable autorestart rejected: {}", e);
                        Response::Err
                    }
                }
            }
            Command::DisableAutorestart { pid } => {
                match self.router.set_autorestart(pid, false).await {
                    Ok(()) => Response::Ok,
                    Err(e) => {
                        warn!("Disable autorestart rejected: {}", e);
                        Response::Err
                    }
                }
            }
            Command::SetStdout { path } => {
                match self.router.set_stdout(path.map(PathBuf::from)).await {
                    Ok(()) => Response::Ok,
                    Err(e) => {
                        warn!("Stdout change rejected: {}", e);
                        Response::Err
                    }
                }
            }
            Command::Shutdown => {
                return match self.router.shutdown().await {
                    Ok(()) => {
                        // the connection closing as the daemon exits is
                        // the acknowledgement
                        info!("Shutdown command honored");
                        true
                    }
                    Err(e) => {
                        warn!("Shutdown rejected: {}", e);
                        write_response(&mut stream, &Response::Err).await;
                        false
                    }
                };
            }
        };

        write_response(&mut stream, &response).await;
        false
    }
}

async fn write_response(stream: &mut UnixStream, response: &Response) {
    if let Err(e) = stream.write_all(&bounded_frame(response)).await {
        warn!("Failed to write response: {}", e);
        return;
    }
    if let Err(e) = stream.shutdown().await {
        debug!("Failed to shut down connection: {}", e);
    }
}

/// Encode a response, downgrading to an error frame when it exceeds
/// what a client is prepared to read
fn bounded_frame(response: &Response) -> Vec<u8> {
    let frame = response.encode();
    if frame.len() <= MAX_RESPONSE_FRAME {
        return frame;
    }
    warn!(
        "Response of {} bytes exceeds the {} byte frame limit",
        frame.len(),
        MAX_RESPONSE_FRAME
    );
    Response::Err.encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::net::UnixStream;

    #[derive(Default)]
    struct RecordingControlPlane {
        shutdown_called: AtomicBool,
        stdout_target: std::sync::Mutex<Option<PathBuf>>,
    }

    #[async_trait]
    impl ControlPlane for RecordingControlPlane {
        async fn run(&self, argv: Vec<String>) -> Result<u32> {
            if argv.is_empty() {
                return Err(IpcError::Rejected("empty argv".to_string()));
            }
            Ok(4242)
        }
        async fn signal(&self, pid: i32, _signal: i32) -> Result<()> {
            if pid == 1 {
                Ok(())
            } else {
                Err(IpcError::Rejected(format!("unknown pid {pid}")))
            }
        }
        async fn list(&self) -> Result<Vec<ProcessInfo>> {
            Ok(vec![ProcessInfo {
                pid: 1,
                program: "/bin/yes".to_string(),
                args: vec![],
                started_at: 0,
                retries_left: 0,
            }])
        }
        async fn set_autorestart(&self, _pid: i32, _enabled: bool) -> Result<()> {
            Ok(())
        }
        async fn set_stdout(&self, path: Option<PathBuf>) -> Result<()> {
            *self.stdout_target.lock().unwrap() = path;
            Ok(())
        }
        async fn shutdown(&self) -> Result<()> {
            self.shutdown_called.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn exchange_raw(path: &std::path::Path, frame: &[u8]) -> Vec<u8> {
        let mut stream = UnixStream::connect(path).await.expect("connect");
        stream.write_all(frame).await.expect("send");
        stream.shutdown().await.expect("half-close");
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.expect("receive");
        buf
    }

    #[tokio::test]
    async fn test_dispatch_until_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sitter.sock");
        let router = Arc::new(RecordingControlPlane::default());

        let server = IpcServer::new(
            IpcServerConfig {
                socket_path: path.clone(),
            },
            router.clone(),
        );
        let server_task = tokio::spawn(async move { server.serve().await });

        // wait for the socket to appear
        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        // run
        let reply = exchange_raw(
            &path,
            &Command::NewProcess {
                argv: vec!["/bin/true".to_string()],
            }
            .encode(),
        )
        .await;
        assert_eq!(Response::decode(&reply).unwrap(), Response::Ok);

        // rejected signal becomes Err, loop survives
        let reply = exchange_raw(&path, &Command::SignalProcess { signal: 15, pid: 7 }.encode()).await;
        assert_eq!(Response::decode(&reply).unwrap(), Response::Err);

        // malformed frame becomes Err, loop survives
        let reply = exchange_raw(&path, &[0xFF, 1, 2, 3]).await;
        assert_eq!(Response::decode(&reply).unwrap(), Response::Err);

        // listing carries the snapshot
        let reply = exchange_raw(&path, &Command::ListProcess.encode()).await;
        match Response::decode(&reply).unwrap() {
            Response::Listing(processes) => {
                assert_eq!(processes.len(), 1);
                assert_eq!(processes[0].program, "/bin/yes");
            }
            other => panic!("expected listing, got {other:?}"),
        }

        // stdout retarget reaches the control plane
        let reply = exchange_raw(
            &path,
            &Command::SetStdout {
                path: Some("/tmp/out.log".to_string()),
            }
            .encode(),
        )
        .await;
        assert_eq!(Response::decode(&reply).unwrap(), Response::Ok);
        assert_eq!(
            *router.stdout_target.lock().unwrap(),
            Some(PathBuf::from("/tmp/out.log"))
        );

        // shutdown: the reply is the connection closing
        let reply = exchange_raw(&path, &Command::Shutdown.encode()).await;
        assert!(reply.is_empty());
        assert!(router.shutdown_called.load(Ordering::SeqCst));

        server_task.await.expect("join").expect("serve");
        assert!(!path.exists(), "socket file should be removed");
    }

    #[test]
    fn test_oversized_listing_is_answered_with_err() {
        let fat = ProcessInfo {
            pid: 1,
            program: "x".repeat(1 << 20),
            args: vec![],
            started_at: 0,
            retries_left: 0,
        };
        let listing = Response::Listing(vec![fat; 17]);
        assert!(listing.encode().len() > MAX_RESPONSE_FRAME);
        assert_eq!(bounded_frame(&listing), Response::Err.encode());
    }
}
