//! Orderly supervisor shutdown
//!
//! Entered exactly once. Stops the reaper first — its join is a hard
//! barrier, so no restart can race the kills that follow — then walks
//! the table in insertion order terminating every child with escalating
//! force: SIGINT, a per-process grace period, then SIGKILL as the
//! backstop. The table lock is held for the entire walk; shutdown is a
//! terminal, single-threaded phase and nothing may mutate the table
//! while processes are being terminated.

use crate::process::unix;
use crate::supervisor::Supervisor;
use crate::{CoreError, Result};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Terminate every managed process and stop the supervisor
///
/// Returns `AlreadyStopping` if a shutdown is already in progress; the
/// first caller wins and re-entry is refused.
pub async fn shutdown(supervisor: &Supervisor) -> Result<()> {
    if !supervisor.begin_stopping() {
        return Err(CoreError::AlreadyStopping);
    }
    info!("Shutting down: stopping reaper");

    // Barrier: the reaper observes Stopping via the state channel and
    // exits its loop; until it has, no termination signal is sent.
    if let Some(handle) = supervisor.take_reaper() {
        if let Err(e) = handle.await {
            warn!("Reaper task join failed: {}", e);
        }
    }

    let grace = Duration::from_millis(supervisor.config().grace_period_ms);
    let mut table = supervisor.table().lock().await;
    let records: Vec<_> = table.iter().cloned().collect();

    for record in &records {
        info!("Sending SIGINT to child {} ({})", record.pid, record.program);
        match unix::send_signal(record.pid, libc::SIGINT) {
            Ok(()) | Err(CoreError::UnknownPid(_)) => {}
            Err(e) => warn!("SIGINT to {} failed: {}", record.pid, e),
        }

        if wait_with_grace(record.pid, grace).await {
            info!("Child {} terminated", record.pid);
            continue;
        }

        info!(
            "Child {} did not exit within {:?} of SIGINT, sending SIGKILL",
            record.pid, grace
        );
        match unix::send_signal(record.pid, libc::SIGKILL) {
            Ok(()) | Err(CoreError::UnknownPid(_)) => {}
            Err(e) => warn!("SIGKILL to {} failed: {}", record.pid, e),
        }
        if let Err(e) = unix::wait_blocking(record.pid) {
            warn!("Wait after SIGKILL of {} failed: {}", record.pid, e);
        }
        info!("Child {} killed", record.pid);
    }

    table.clear();
    info!("Shutdown complete: {} children terminated", records.len());
    Ok(())
}

/// Poll for a child's exit until the grace period elapses
async fn wait_with_grace(pid: u32, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    loop {
        match unix::try_reap(pid) {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(e) => {
                warn!("Polling child {} failed: {}", pid, e);
                return false;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}
