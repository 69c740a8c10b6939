//! cycler: run Cloud Cycler tasks against a fleet.
//!
//! ```text
//! cycler run   --config cycler.toml --fleet fleet.json [--task staging] [--dry-run]
//! cycler watch --config cycler.toml --fleet fleet.json --interval 300
//! cycler check --config cycler.toml
//! cycler override set stack app-staging --schedule "MTWTF-- 0700-2000"
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cycler_core::ResourceKind;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "cycler",
    about = "Cloud Cycler: switch cloud resources on and off on a weekly schedule",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every task once and exit.
    Run {
        #[command(flatten)]
        pass: PassArgs,
        /// Evaluate schedules at this RFC 3339 time instead of now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Run a pass every interval until interrupted.
    Watch {
        #[command(flatten)]
        pass: PassArgs,
        /// Seconds between the end of one pass and the start of the next.
        #[arg(long, default_value = "300")]
        interval: u64,
    },
    /// Validate configuration and show which tasks are in their window.
    Check {
        #[arg(short, long, default_value = "cycler.toml")]
        config: PathBuf,
        #[arg(long)]
        at: Option<String>,
    },
    /// Manage per-resource schedule overrides.
    Override {
        #[command(flatten)]
        store: StoreArgs,
        #[command(subcommand)]
        action: OverrideAction,
    },
}

/// Where configuration and state live.
#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    #[arg(short, long, default_value = "cycler.toml")]
    pub config: PathBuf,
    /// State database; defaults to `state_path` from the configuration.
    #[arg(long)]
    pub state: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct PassArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Fleet description (JSON). Updated in place after each pass.
    #[arg(short, long)]
    pub fleet: PathBuf,
    /// Only run the task with this name.
    #[arg(short, long)]
    pub task: Option<String>,
    /// Log mutations as `noop - ...` instead of issuing them.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum OverrideAction {
    /// Replace the schedule of one resource, or disable it.
    Set {
        /// instance, scaling_group or stack
        kind: ResourceKind,
        id: String,
        #[arg(long, conflicts_with = "disable")]
        schedule: Option<String>,
        #[arg(long)]
        disable: bool,
    },
    /// Remove an override.
    Clear { kind: ResourceKind, id: String },
    /// List every override.
    List,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cycler=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Commands::Run { pass, at } => commands::run::run(&pass, at.as_deref()),
        Commands::Watch { pass, interval } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::watch::watch(pass, interval))
        }
        Commands::Check { config, at } => commands::check::check(&config, at.as_deref()),
        Commands::Override { store, action } => commands::overrides::dispatch(&store, action),
    }
}
