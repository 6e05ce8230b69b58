//! `PledgeKeeper` - offline donation capture host
//!
//! Runs the donation engine against a live site and offers tools to inspect
//! and repair the local queue of captured donations.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod host;
mod settings;
mod surface;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pledgekeeper_core::{DonationStatus, DonationStore, Engine, EngineConfig};
use pledgekeeper_http::HttpFetcher;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use surface::{HostSurface, SurfaceKind};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "pledgekeeper")]
#[command(version, about = "Offline donation capture and replay")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides the config)
    #[arg(long, value_name = "PATH", global = true)]
    database: Option<PathBuf>,

    /// Where notifications are shown
    #[arg(long, value_enum, default_value_t = SurfaceKind::Desktop, global = true)]
    notifications: SurfaceKind,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install and activate, then sync in the background and answer control
    /// messages read from stdin
    Run,
    /// Run one sync cycle and print the report
    Sync,
    /// List captured offline donations
    Records {
        /// Only show records with this status
        #[arg(long, value_parser = parse_status)]
        status: Option<DonationStatus>,
    },
    /// List saved donation intents
    Intents,
    /// Delete a saved donation intent
    DismissIntent {
        /// Intent id
        id: String,
    },
    /// Queue a failed donation for replay again
    Resubmit {
        /// Store id of the record
        id: i64,
    },
}

fn parse_status(s: &str) -> Result<DonationStatus, String> {
    s.parse().map_err(|e: pledgekeeper_core::Error| e.to_string())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "pledgekeeper=debug,pledgekeeper_core=debug,pledgekeeper_http=debug"
    } else {
        "pledgekeeper=info,pledgekeeper_core=info,pledgekeeper_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = settings::load_config(cli.config.as_deref()).await?;
    config.validate()?;
    let db_path = settings::database_path(cli.database.as_deref(), &config).await?;
    let store = DonationStore::new(&db_path)
        .await
        .with_context(|| format!("opening {db_path}"))?;
    info!(path = %db_path, "Opened donation store");

    match cli.command {
        Command::Run => {
            let (engine, fetcher) = build_engine(config, store, cli.notifications)?;
            host::run(engine, fetcher).await?;
        }
        Command::Sync => {
            let (engine, _fetcher) = build_engine(config, store, cli.notifications)?;
            let report = engine.sync().await?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Command::Records { status } => {
            let records = match status {
                Some(status) => store.list_by_status(status).await?,
                None => store.list_offline().await?,
            };
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
            let counts = store.count_by_status().await?;
            info!(
                pending_online = counts.pending_online,
                processed = counts.processed,
                failed = counts.failed,
                "Record totals"
            );
        }
        Command::Intents => {
            for intent in store.list_intents().await? {
                println!("{}", serde_json::to_string(&intent)?);
            }
        }
        Command::DismissIntent { id } => {
            if !store.dismiss_intent(&id).await? {
                anyhow::bail!("no intent with id {id}");
            }
            info!(%id, "Intent dismissed");
        }
        Command::Resubmit { id } => {
            store.resubmit_failed(id).await?;
            info!(id, "Record queued for replay");
        }
    }

    Ok(())
}

fn build_engine(
    config: EngineConfig,
    store: DonationStore,
    notifications: SurfaceKind,
) -> anyhow::Result<(Engine<HttpFetcher, HostSurface>, Arc<HttpFetcher>)> {
    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout())?);
    let surface = Arc::new(HostSurface::new(notifications));
    let engine = Engine::new(config, store, Arc::clone(&fetcher), surface)?;
    Ok((engine, fetcher))
}
