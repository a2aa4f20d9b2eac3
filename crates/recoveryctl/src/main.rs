mod commands;
mod error;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use recovery_operations::RecoveryConfig;
use recovery_operations::config::DEFAULT_CONFIG_PATH;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::Commands;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "recoveryctl")]
#[command(about = "Boot rescue VMs and export disk images from backup snapshots", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log more detail (repeat for trace output). `RUST_LOG` takes precedence.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match RecoveryConfig::load(&cli.config) {
        Ok(config) => {
            debug!(path = %cli.config.display(), "configuration loaded");
            config
        }
        Err(e) => {
            print_error(&CliError::Config(e));
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = cli.command.execute(&config) {
        print_error(&e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "warn",
        1 => "info,recovery_transaction=debug,recovery_operations=debug",
        _ => "debug,recovery_transaction=trace,recovery_operations=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
