//! Child-exit monitor loop and restart policy
//!
//! The reaper is the only component that collects exit statuses of
//! managed children. It parks on the runtime's SIGCHLD stream — the
//! signal driver does nothing in signal context beyond the
//! async-signal-safe wakeup, so all locking and allocation happens
//! here, never in the handler. Notifications coalesce: one wakeup may
//! stand for several deaths, so every wakeup drains with non-blocking
//! waits until no exited child remains.

use crate::process::unix::{self, ReapedChild};
use crate::process::ProcessRecord;
use crate::supervisor::Supervisor;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

/// What to do with a record whose process has exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Launch a replacement with the decremented budget
    Respawn { retries_left: u32 },
    /// Let the record go
    Forget,
}

/// Restart policy: respawn while the retry budget lasts
///
/// Each restart consumes one unit of budget; a budget of zero means the
/// lineage ends here.
pub fn restart_decision(record: &ProcessRecord) -> RestartDecision {
    if record.retries_left > 0 {
        RestartDecision::Respawn {
            retries_left: record.retries_left - 1,
        }
    } else {
        RestartDecision::Forget
    }
}

/// Run the reaper until the supervisor begins stopping
///
/// Started once at daemon bootstrap; the shutdown sequencer wakes it
/// through the state channel and joins it before any termination
/// signal is sent.
pub async fn run(supervisor: Arc<Supervisor>) {
    let mut sigchld = match signal(SignalKind::child()) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to install SIGCHLD stream: {}", e);
            return;
        }
    };
    let mut state_rx = supervisor.subscribe_state();

    info!("Reaper started");
    loop {
        tokio::select! {
            _ = sigchld.recv() => {}
            _ = state_rx.changed() => {}
        }

        if supervisor.is_stopping() {
            break;
        }

        drain(&supervisor).await;
    }
    info!("Reaper stopped");
}

/// Collect every exited child currently pending
async fn drain(supervisor: &Supervisor) {
    loop {
        let reaped = match unix::reap_any() {
            Ok(Some(reaped)) => reaped,
            Ok(None) => break,
            Err(e) => {
                error!("Reap failed: {}", e);
                break;
            }
        };
        handle_exit(supervisor, reaped).await;
    }
}

/// Apply the restart policy to one exited child
///
/// Lookup, restart and removal happen under a single table-lock
/// acquisition, so an exit is always resolved into exactly one of:
/// record removed, or record replaced by one restarted successor.
async fn handle_exit(supervisor: &Supervisor, reaped: ReapedChild) {
    let mut table = supervisor.table().lock().await;

    let Some(record) = table.find_by_pid(reaped.pid).map(ProcessRecord::clone) else {
        debug!("Exit notification for untracked pid {}, ignoring", reaped.pid);
        return;
    };

    table.remove(reaped.pid);

    match restart_decision(&record) {
        RestartDecision::Respawn { retries_left } => {
            info!(
                "Process {} ({}) exited ({:?}); restarting with {} retries left",
                reaped.pid, record.program, reaped.exit, retries_left
            );
            match supervisor.register_spawn_locked(
                &mut table,
                &record.program,
                &record.args,
                record.stdout_file.clone(),
                retries_left,
            ) {
                Ok(new_pid) => debug!("Restarted {} as pid {}", record.program, new_pid),
                // the request lineage ends; the daemon itself is unaffected
                Err(e) => warn!("Restart of {} failed: {}", record.program, e),
            }
        }
        RestartDecision::Forget => {
            info!(
                "Process {} ({}) exited ({:?}); no retries left",
                reaped.pid, record.program, reaped.exit
            );
        }
    }
}
