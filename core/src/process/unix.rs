//! Unix process primitives: spawn, signal delivery, and reaping
//!
//! The launcher spawns children with `std::process::Command` and then
//! forgets the `Child` handle: collecting exit statuses is the reaper's
//! job, via `waitpid`, so nothing else in the daemon may wait on a
//! managed pid. Signals are delivered with `nix::sys::signal::kill`,
//! with `ESRCH` mapped to an explicit unknown-pid error instead of
//! being ignored.

use crate::{CoreError, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error};

/// How a reaped child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Normal exit with the given status code
    Exited(i32),
    /// Terminated by the given signal number
    Signaled(i32),
}

/// One child collected by a non-blocking reap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapedChild {
    /// Pid of the exited child
    pub pid: u32,
    /// Exit status or terminating signal
    pub exit: ExitKind,
}

/// Spawn a new process, optionally redirecting its stdout
///
/// If `stdout_file` is given it is opened for writing (created if
/// absent) and wired up as the child's standard output. Failure to
/// open the target, to fork, or to load the program image all surface
/// here as a spawn error confined to this request; the daemon is
/// unaffected.
pub fn spawn(program: &str, args: &[String], stdout_file: Option<&Path>) -> Result<u32> {
    debug!("Spawning process: {} {:?}", program, args);

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());

    if let Some(path) = stdout_file {
        let file = File::options()
            .create(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                CoreError::Spawn(format!(
                    "failed to open stdout target {}: {}",
                    path.display(),
                    e
                ))
            })?;
        command.stdout(Stdio::from(file));
    }

    let child = command.spawn().map_err(|e| {
        error!("Failed to spawn process '{}': {}", program, e);
        CoreError::Spawn(format!("failed to spawn '{}': {}", program, e))
    })?;

    let pid = child.id();
    debug!("Successfully spawned process {}", pid);

    // Dropping the handle neither kills nor reaps the child; the
    // reaper collects its exit status through waitpid.
    drop(child);

    Ok(pid)
}

/// Deliver a signal to a process
///
/// `ESRCH` means no such process and is reported as `UnknownPid` so the
/// caller can answer the request explicitly rather than signalling into
/// the void.
pub fn send_signal(pid: u32, signal: i32) -> Result<()> {
    let signal = Signal::try_from(signal)
        .map_err(|e| CoreError::Signal(format!("invalid signal {}: {}", signal, e)))?;

    debug!("Sending {} to process {}", signal, pid);
    match kill(Pid::from_raw(pid as i32), signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(CoreError::UnknownPid(pid)),
        Err(e) => Err(CoreError::Signal(format!(
            "failed to send {} to process {}: {}",
            signal, pid, e
        ))),
    }
}

/// Collect any exited child without blocking
///
/// Returns `None` once no further children have exited; callers drain
/// by invoking this in a loop, because child-exit notifications
/// coalesce and one wakeup may cover several deaths.
pub fn reap_any() -> Result<Option<ReapedChild>> {
    match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::Exited(pid, code)) => Ok(Some(ReapedChild {
            pid: pid.as_raw() as u32,
            exit: ExitKind::Exited(code),
        })),
        Ok(WaitStatus::Signaled(pid, signal, _)) => Ok(Some(ReapedChild {
            pid: pid.as_raw() as u32,
            exit: ExitKind::Signaled(signal as i32),
        })),
        Ok(WaitStatus::StillAlive) => Ok(None),
        // stopped/continued children are not exits; nothing to collect
        Ok(_) => Ok(None),
        Err(Errno::ECHILD) => Ok(None),
        Err(e) => Err(CoreError::Wait(format!("waitpid failed: {}", e))),
    }
}

/// Poll whether a specific child has exited, without blocking
pub fn try_reap(pid: u32) -> Result<Option<ExitKind>> {
    match waitpid(Pid::from_raw(pid as i32), Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::Exited(_, code)) => Ok(Some(ExitKind::Exited(code))),
        Ok(WaitStatus::Signaled(_, signal, _)) => Ok(Some(ExitKind::Signaled(signal as i32))),
        Ok(WaitStatus::StillAlive) => Ok(None),
        Ok(_) => Ok(None),
        // already reaped elsewhere counts as exited
        Err(Errno::ECHILD) => Ok(Some(ExitKind::Exited(0))),
        Err(e) => Err(CoreError::Wait(format!(
            "waitpid for process {} failed: {}",
            pid, e
        ))),
    }
}

/// Block until a specific child exits and collect it
pub fn wait_blocking(pid: u32) -> Result<()> {
    match waitpid(Pid::from_raw(pid as i32), None) {
        Ok(_) => Ok(()),
        Err(Errno::ECHILD) => Ok(()),
        Err(e) => Err(CoreError::Wait(format!(
            "waitpid for process {} failed: {}",
            pid, e
        ))),
    }
}

/// Whether a process with the given pid currently exists
pub fn alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}
