//! keeper: treasury keeper for a staking vault.
//!
//! One-shot commands for the APR Controller and the Distribution Engine, a
//! read-only `status`, and a long-running scheduler that fires both on their
//! cadences. Every command prints one JSON run report on stdout and exits
//! with the code of its error class.

mod commands;
mod config;
mod report;
mod schedule;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use keeper_ledger::rpc::RpcLedger;
use keeper_store::Store;
use keeper_types::unix_now;

use crate::commands::{adjustment, distribution, scheduler, status, Keeper};
use crate::config::KeeperConfig;
use crate::report::{Failure, RunReport};

#[derive(Parser)]
#[command(name = "keeper")]
#[command(about = "Treasury keeper: APR adjustment and role-weighted distribution", version)]
struct Cli {
    /// Config file (default: $KEEPER_DATA_DIR/keeper.toml or ~/.keeper/keeper.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute and commit the APR if the cooldown has ended
    RunAdjustment,

    /// Distribute the treasury balance to the role table
    RunDistribution {
        /// Print the plan without transferring
        #[arg(long)]
        dry_run: bool,
    },

    /// Fire adjustments daily and distributions weekly until Ctrl-C
    RunScheduler,

    /// Show vault, treasury and schedule state
    Status,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::RunAdjustment => adjustment::COMMAND,
            Self::RunDistribution { .. } => distribution::COMMAND,
            Self::RunScheduler => scheduler::COMMAND,
            Self::Status => status::COMMAND,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.name();

    // Config first: it carries the log level.
    let loaded = KeeperConfig::load(cli.config.as_deref());
    let level = loaded
        .as_ref()
        .map_or("info", |config| config.logging.level.as_str());

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("keeper={level}").parse()?),
        )
        .init();

    let report = match loaded {
        Ok(config) => match execute(&cli.command, &config).await {
            Ok(report) => report,
            Err(failure) => RunReport::failed(command, failure),
        },
        Err(e) => RunReport::failed(command, Failure::from(e)),
    };

    let code = report.exit_code();
    match (&report.error_class, code) {
        (Some(class), 0) => info!(command, %class, "finished"),
        (Some(class), _) => error!(
            command,
            %class,
            error = report.message.as_deref().unwrap_or_default(),
            "failed"
        ),
        (None, _) => info!(command, outcome = ?report.outcome, "finished"),
    }
    println!("{}", serde_json::to_string(&report)?);
    std::process::exit(code);
}

async fn execute(command: &Commands, config: &KeeperConfig) -> Result<RunReport, Failure> {
    let contracts = config.contracts()?;
    let data_dir = config.data_dir();
    // Validate everything before touching the network or the disk.
    config.policy()?;
    config.role_table()?;

    let ledger = RpcLedger::new(config.network.rpc_url.clone(), contracts, config.timeouts())?;
    let store = Store::open(&data_dir)?;
    let mut keeper = Keeper::new(config, contracts, ledger, store)?;
    info!(
        network = %config.network.name,
        data_dir = %data_dir.display(),
        roles = keeper.table.len(),
        "keeper ready"
    );

    let now = unix_now();
    match command {
        Commands::RunAdjustment => adjustment::run(&mut keeper, now).await,
        Commands::RunDistribution { dry_run } => {
            distribution::run(&mut keeper, now, *dry_run).await
        }
        Commands::RunScheduler => scheduler::run(&mut keeper).await,
        Commands::Status => status::run(&keeper, now).await,
    }
}
