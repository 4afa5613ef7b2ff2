//! # Site Access Inspector
//!
//! Answers site-access questions against a directory snapshot.
//!
//! ## Commands
//!
//! - `check <USER> <SITE>` - Can the user act on the site, and why
//! - `list <USER>` - Sites the user may act on (`--visible` applies the division predicate)
//! - `division <USER>` - Division predicate for the user
//! - `grants <USER>` - Grants in force for the user
//!
//! ## Configuration
//!
//! Environment variables:
//! - `SITE_ACCESS_SNAPSHOT` - Snapshot file (instead of `--snapshot`)
//! - `RUST_LOG` - Log filter (overrides `-v`)
//! - `SITE_ACCESS_CACHE_*`, `SITE_ACCESS_METRICS_ENABLED` - Engine settings

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use mealops_access::{
    AccessConfig, AccessError, AccessEvaluator, DirectorySnapshot, InMemoryDirectory,
};
use serde::Serialize;
use tracing::{error, info};

/// Inspect site access for users of the meal operations platform
#[derive(Debug, Parser)]
#[command(name = "site-access", author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity level (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory snapshot (JSON)
    #[arg(
        short,
        long,
        env = "SITE_ACCESS_SNAPSHOT",
        value_hint = ValueHint::FilePath
    )]
    snapshot: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Can the user act on the site?
    Check { user: String, site: String },

    /// Sites the user may act on
    List {
        user: String,

        /// Narrow the listing by the user's division predicate
        #[arg(long)]
        visible: bool,
    },

    /// Division predicate for the user
    Division { user: String },

    /// Grants in force for the user
    Grants { user: String },
}

/// Exit codes
#[repr(u8)]
enum Exit {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    UnknownUser = 3,
    DirectoryError = 4,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            return Exit::GeneralError.into();
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            error!("{:#}", e);
            exit_code(&e).into()
        }
    }
}

/// Log filter used when `RUST_LOG` is unset
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose))),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn exit_code(err: &anyhow::Error) -> Exit {
    match err.downcast_ref::<AccessError>() {
        Some(AccessError::UserNotFound(_)) => Exit::UnknownUser,
        Some(AccessError::DirectoryUnavailable(_)) => Exit::DirectoryError,
        Some(AccessError::Configuration(_)) | Some(AccessError::Snapshot(_)) => Exit::ConfigError,
        _ => Exit::GeneralError,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AccessConfig::from_env()?;

    let snapshot = DirectorySnapshot::load(&cli.snapshot)
        .await
        .with_context(|| format!("loading snapshot {}", cli.snapshot.display()))?;
    let directory = Arc::new(InMemoryDirectory::from_snapshot(snapshot)?);

    info!("Loaded snapshot {}", cli.snapshot.display());

    let evaluator = AccessEvaluator::with_config(directory, config)?;

    match cli.command {
        Command::Check { user, site } => print_json(&evaluator.check(&user, &site).await?),
        Command::List { user, visible } => {
            let sites = if visible {
                evaluator.list_visible_site_ids(&user).await?
            } else {
                evaluator.list_accessible_site_ids(&user).await?
            };
            print_json(&sites)
        }
        Command::Division { user } => print_json(&evaluator.division_filter(&user).await?),
        Command::Grants { user } => {
            print_json(&evaluator.resolver().resolve_grants(&user).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
