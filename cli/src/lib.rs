//! sitter CLI support library
//!
//! Output rendering and the daemon-start helper used by the `sitter`
//! binary.

pub mod error;

pub use error::{CliError, Result};

use sitter_schema::ProcessInfo;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::info;

/// Render a process listing as an aligned table
pub fn render_listing(processes: &[ProcessInfo]) -> String {
    if processes.is_empty() {
        return "No managed processes\n".to_string();
    }
    let mut out = format!(
        "{:>8}  {:>10}  {:>8}  COMMAND\n",
        "PID", "STARTED", "RETRIES"
    );
    for p in processes {
        let mut command = p.program.clone();
        for arg in &p.args {
            command.push(' ');
            command.push_str(arg);
        }
        out.push_str(&format!(
            "{:>8}  {:>10}  {:>8}  {}\n",
            p.pid, p.started_at, p.retries_left, command
        ));
    }
    out
}

/// Spawn `sitterd` detached and wait for its control socket to appear
pub fn start_daemon(sitterd: &str, socket: &Path, extra_args: &[String]) -> Result<u32> {
    let mut cmd = Command::new(sitterd);
    cmd.arg("--socket")
        .arg(socket)
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let child = cmd
        .spawn()
        .map_err(|e| CliError::DaemonStart(format!("{}: {}", sitterd, e)))?;
    let pid = child.id();

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if socket.exists() {
            info!("Daemon started (pid {})", pid);
            return Ok(pid);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    Err(CliError::DaemonStart(format!(
        "daemon did not create {} within 5s",
        socket.display()
    )))
}
