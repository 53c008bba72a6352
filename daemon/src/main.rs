//! sitter daemon binary
//!
//! Hosts the process supervisor and its control socket until a
//! `shutdown` command or a termination signal arrives.

use clap::Parser;
use sitter_core::config::load_config_from_toml_path;
use sitter_core::DaemonConfig;
use sitter_daemon::bootstrap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sitterd", about = "sitter process supervisor daemon", version)]
struct Args {
    /// Path to the control socket
    #[arg(long)]
    socket: Option<PathBuf>,

    /// File that receives the stdout of every managed process
    #[arg(long)]
    stdout_file: Option<PathBuf>,

    /// Restart budget for newly launched processes
    #[arg(long)]
    retries: Option<u32>,

    /// Grace period between SIGINT and SIGKILL at shutdown, in milliseconds
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Resolve the effective configuration: flags beat the file, the file
/// beats the built-in defaults.
fn resolve_config(args: &Args) -> sitter_core::Result<DaemonConfig> {
    let mut config = match &args.config {
        Some(path) => load_config_from_toml_path(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(socket) = &args.socket {
        config.socket_path = socket.clone();
    }
    if let Some(stdout_file) = &args.stdout_file {
        config.stdout_file = Some(stdout_file.clone());
    }
    if let Some(retries) = args.retries {
        config.default_retries = retries;
    }
    if let Some(grace_ms) = args.grace_ms {
        config.grace_period_ms = grace_ms;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sitterd: [{}] {}", e.code(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = sitter_core::utils::init_tracing(&config.log_level) {
        eprintln!("sitterd: [{}] {}", e.code(), e);
        return ExitCode::FAILURE;
    }

    let handle = match bootstrap(config).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match handle.run_until_stopped().await {
        Ok(()) => {
            info!("sitter daemon stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Daemon terminated with error: {}", e);
            ExitCode::FAILURE
        }
    }
}
