//! sitter CLI binary
//!
//! Talks to the sitter daemon over its Unix domain socket.

use clap::{Parser, Subcommand, ValueEnum};
use sitter_cli::{render_listing, start_daemon, CliError};
use sitter_ipc::UdsClient;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(name = "sitter")]
#[command(about = "A CLI tool to manage the sitter process supervisor")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon control socket
    #[arg(long, default_value = "/tmp/sitter.sock")]
    socket: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the daemon itself
    Daemon {
        #[command(subcommand)]
        cmd: DaemonCmd,
    },
    /// Launch a process under supervision
    Run {
        /// Program and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },
    /// Send a signal to a managed process
    Signal {
        /// Target pid
        pid: i32,
        /// Signal number
        signal: i32,
    },
    /// List managed processes
    List,
    /// Toggle automatic restart for a managed process
    Autorestart {
        /// Target pid
        pid: i32,
        /// on or off
        state: Toggle,
    },
    /// Redirect stdout of subsequently launched processes
    Stdout {
        /// Target file; omit to disable redirection
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum DaemonCmd {
    /// Start a daemon on the configured socket
    Start {
        /// Path to the sitterd binary
        #[arg(long, default_value = "sitterd")]
        sitterd: String,
        /// Extra flags forwarded to sitterd verbatim
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Ask the daemon to terminate all children and exit
    Shutdown,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

async fn execute(cli: Cli) -> sitter_cli::Result<()> {
    let client = UdsClient::new(&cli.socket);
    match cli.command {
        Commands::Daemon { cmd } => match cmd {
            DaemonCmd::Start { sitterd, args } => {
                let pid = start_daemon(&sitterd, &cli.socket, &args)?;
                println!("Daemon started (pid {})", pid);
                Ok(())
            }
            DaemonCmd::Shutdown => {
                client.shutdown().await?;
                println!("Daemon stopped");
                Ok(())
            }
        },
        Commands::Run { argv } => {
            client.run(argv).await?;
            println!("OK");
            Ok(())
        }
        Commands::Signal { pid, signal } => {
            if pid <= 0 {
                return Err(CliError::InvalidArgument(format!(
                    "pid must be positive, got {}",
                    pid
                )));
            }
            client.signal(pid, signal).await?;
            println!("OK");
            Ok(())
        }
        Commands::List => {
            let listing = client.list().await?;
            print!("{}", render_listing(&listing));
            Ok(())
        }
        Commands::Autorestart { pid, state } => {
            if pid <= 0 {
                return Err(CliError::InvalidArgument(format!(
                    "pid must be positive, got {}",
                    pid
                )));
            }
            client
                .set_autorestart(pid, matches!(state, Toggle::On))
                .await?;
            println!("OK");
            Ok(())
        }
        Commands::Stdout { path } => {
            let target = match &path {
                Some(path) => Some(path.to_str().ok_or_else(|| {
                    CliError::InvalidArgument(format!(
                        "path {} is not valid UTF-8",
                        path.display()
                    ))
                })?),
                None => None,
            };
            client.set_stdout(target).await?;
            println!("OK");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[{}] {}", e.code(), e);
            eprintln!("sitter: [{}] {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}
