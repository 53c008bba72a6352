//! Shared helpers for daemon integration tests

use sitter_core::DaemonConfig;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration pointing at a socket inside a per-test tempdir
pub fn test_config(dir: &Path) -> DaemonConfig {
    DaemonConfig {
        socket_path: dir.join("sitter.sock"),
        stdout_file: None,
        default_retries: 0,
        grace_period_ms: 1000,
        log_level: "info".to_string(),
    }
}

/// Wait for the daemon's control socket to appear
pub async fn wait_for_socket(path: &Path) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("socket {} never appeared", path.display());
}

/// Whether a process with this pid still exists
pub fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}
