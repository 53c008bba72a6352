//! Supervisor engine
//!
//! The [`Supervisor`] is the explicit context object shared by the
//! command dispatcher, the reaper, and the shutdown sequencer. It owns
//! the process table behind an async mutex (the table's exclusive
//! lock), the one-way `Running -> Stopping` lifecycle flag, and the
//! runtime-mutable default stdout redirection target.
//!
//! Locking discipline: every table read or write happens with the lock
//! held, and no operation holds it across a blocking wait — except the
//! shutdown sequencer, which keeps it for its whole terminal phase so
//! nothing can mutate the table while processes are being terminated.

use crate::process::{unix, ProcessRecord, ProcessTable};
use crate::{CoreError, Result};
use sitter_schema::{DaemonConfig, ProcessInfo};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

pub mod reaper;
pub mod shutdown;

pub use reaper::{restart_decision, RestartDecision};

/// Process-wide lifecycle flag
///
/// Transitions once, from `Running` to `Stopping`, and never reverses.
/// Written only by the shutdown sequencer; read by the reaper to decide
/// whether to keep looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    Stopping,
}

/// Shared supervisor context
#[derive(Debug)]
pub struct Supervisor {
    config: DaemonConfig,
    table: Mutex<ProcessTable>,
    state_tx: watch::Sender<SupervisorState>,
    state_rx: watch::Receiver<SupervisorState>,
    stdout_file: StdMutex<Option<PathBuf>>,
    total_launched: AtomicU64,
    shutdown_entered: AtomicBool,
    reaper_task: StdMutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Create a supervisor from the daemon configuration
    pub fn new(config: DaemonConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(SupervisorState::Running);
        let stdout_file = StdMutex::new(config.stdout_file.clone());
        Self {
            config,
            table: Mutex::new(ProcessTable::new()),
            state_tx,
            state_rx,
            stdout_file,
            total_launched: AtomicU64::new(0),
            shutdown_entered: AtomicBool::new(false),
            reaper_task: StdMutex::new(None),
        }
    }

    /// The configuration the supervisor was built with
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Launch a new managed process from a full argument vector
    ///
    /// `argv[0]` is the program; the retry budget comes from the
    /// configuration and stdout goes to the current redirection target.
    /// Refused with `AlreadyStopping` once shutdown has begun.
    pub async fn launch(&self, argv: Vec<String>) -> Result<u32> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .ok_or_else(|| CoreError::Spawn("empty argument vector".to_string()))?;
        let args: Vec<String> = argv.collect();
        let stdout_file = self.current_stdout_path();
        let retries = self.config.default_retries;

        // The lock is held across spawn+insert so the record is in the
        // table before the reaper can process this pid's exit.
        let mut table = self.table.lock().await;
        // A launch that was queued behind the shutdown sequencer's kill
        // walk must not insert into the cleared table.
        if self.is_stopping() {
            return Err(CoreError::AlreadyStopping);
        }
        self.register_spawn_locked(&mut table, &program, &args, stdout_file, retries)
    }

    /// Spawn and register a process while already holding the table lock
    ///
    /// Used by `launch` and by the reaper's restart path, which must
    /// replace a record within a single lock acquisition.
    pub(crate) fn register_spawn_locked(
        &self,
        table: &mut ProcessTable,
        program: &str,
        args: &[String],
        stdout_file: Option<PathBuf>,
        retries: u32,
    ) -> Result<u32> {
        let pid = unix::spawn(program, args, stdout_file.as_deref())?;
        table.insert(ProcessRecord::new(
            pid,
            program.to_string(),
            args.to_vec(),
            stdout_file,
            retries,
        ));
        self.total_launched.fetch_add(1, Ordering::Relaxed);
        Ok(pid)
    }

    /// Deliver a signal to a managed process
    ///
    /// A pid that is not in the table is an explicit error, answered
    /// with `Err` on the wire, never a silent no-op.
    pub async fn signal(&self, pid: i32, signal: i32) -> Result<()> {
        let pid = u32::try_from(pid).map_err(|_| CoreError::UnknownPid(0))?;
        let table = self.table.lock().await;
        if table.find_by_pid(pid).is_none() {
            return Err(CoreError::UnknownPid(pid));
        }
        unix::send_signal(pid, signal)
    }

    /// Snapshot of all live records, taken under the table lock
    pub async fn list(&self) -> Vec<ProcessInfo> {
        self.table.lock().await.snapshot()
    }

    /// Set a process's retry budget to the configured positive value,
    /// or to zero
    pub async fn set_autorestart(&self, pid: i32, enabled: bool) -> Result<()> {
        let pid = u32::try_from(pid).map_err(|_| CoreError::UnknownPid(0))?;
        let mut table = self.table.lock().await;
        let record = table
            .find_by_pid_mut(pid)
            .ok_or(CoreError::UnknownPid(pid))?;
        record.retries_left = if enabled {
            // a configured budget of zero would make enabling a no-op
            self.config.default_retries.max(1)
        } else {
            0
        };
        debug!(
            "Autorestart for pid {} set to {} retries",
            pid, record.retries_left
        );
        Ok(())
    }

    /// Update the default stdout redirection target
    ///
    /// Takes effect for subsequently launched processes only.
    pub fn set_stdout_path(&self, path: Option<PathBuf>) {
        *self.stdout_file.lock().expect("stdout path lock poisoned") = path;
    }

    /// The stdout redirection target new launches will use
    pub fn current_stdout_path(&self) -> Option<PathBuf> {
        self.stdout_file
            .lock()
            .expect("stdout path lock poisoned")
            .clone()
    }

    /// Subscribe to lifecycle state changes
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state_rx.clone()
    }

    /// Whether the supervisor has begun shutting down
    pub fn is_stopping(&self) -> bool {
        *self.state_rx.borrow() == SupervisorState::Stopping
    }

    /// Total number of processes ever launched, restarts included
    pub fn total_launched(&self) -> u64 {
        self.total_launched.load(Ordering::Relaxed)
    }

    /// Number of live records currently in the table
    pub async fn live_count(&self) -> usize {
        self.table.lock().await.len()
    }

    /// Hand the reaper's join handle to the supervisor so the shutdown
    /// sequencer can wait for it
    pub fn attach_reaper(&self, handle: JoinHandle<()>) {
        *self.reaper_task.lock().expect("reaper slot lock poisoned") = Some(handle);
    }

    pub(crate) fn table(&self) -> &Mutex<ProcessTable> {
        &self.table
    }

    pub(crate) fn take_reaper(&self) -> Option<JoinHandle<()>> {
        self.reaper_task
            .lock()
            .expect("reaper slot lock poisoned")
            .take()
    }

    /// Flip the lifecycle flag; returns false if shutdown was already
    /// entered by someone else
    pub(crate) fn begin_stopping(&self) -> bool {
        if self.shutdown_entered.swap(true, Ordering::SeqCst) {
            return false;
        }
        // receivers holding the other end are woken; send only fails if
        // every receiver is gone, which still leaves borrow() correct
        let _ = self.state_tx.send(SupervisorState::Stopping);
        true
    }
}
