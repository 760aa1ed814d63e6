use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvest_core::{
    load_config, shutdown_channel, validate_config, ConfigError, DataForSeoClient, FetchSummary,
    Pipeline, SanitizedConfig, ShutdownTrigger,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code for a run stopped by Ctrl+C or SIGTERM.
const EXIT_INTERRUPTED: u8 = 130;

/// Exit code for an unusable configuration (sysexits `EX_CONFIG`).
const EXIT_CONFIG: u8 = 78;

#[derive(Debug, Parser)]
#[command(name = "harvest", version, about = "Bulk on-page content harvesting")]
struct Cli {
    /// Path to the TOML configuration file. Falls back to `HARVEST_CONFIG`,
    /// then `harvest.toml`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit every listing in the input directory and fetch the results.
    Run {
        /// Ignore the saved cursor and start from the first file.
        #[arg(long)]
        force_restart: bool,
    },
    /// Fetch results for submissions persisted in the queue directory.
    Fetch,
    /// Re-submit ledger failures into the retry store.
    Retry {
        /// Retry generation, starting at 1.
        #[arg(long, default_value_t = 1)]
        generation: u32,
        /// Also queue thin artifacts found in the primary store.
        #[arg(long)]
        thin: bool,
    },
    /// Report artifacts below the configured size.
    ThinScan,
    /// File a ledger row for every listing without an artifact.
    Reconcile,
    /// Build the final store from the primary and retry stores.
    Merge,
    /// Print the effective configuration with secrets redacted.
    Config,
}

/// How a command finished.
enum Outcome {
    Completed,
    Interrupted,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match run(cli).await {
        Ok(Outcome::Completed) => ExitCode::SUCCESS,
        Ok(Outcome::Interrupted) => {
            warn!("Interrupted; progress saved");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    info!("harvest {}", VERSION);

    let config_path = cli.config.clone().unwrap_or_else(|| {
        std::env::var("HARVEST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("harvest.toml"))
    });

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)?;
    validate_config(&config)?;
    info!("Configuration loaded successfully");
    info!("Input directory: {:?}", config.paths.input_dir);
    info!("Content store: {:?}", config.paths.store_root);

    if let Command::Config = cli.command {
        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string_pretty(&sanitized)
            .context("Failed to serialize configuration")?;
        println!("{}", json);
        return Ok(Outcome::Completed);
    }

    let api = Arc::new(DataForSeoClient::new(&config.api).context("Failed to create API client")?);

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(forward_shutdown(trigger));

    let pipeline = Pipeline::new(config, api, shutdown.clone());

    let interrupted = match cli.command {
        Command::Run { force_restart } => {
            let summary = pipeline.run(force_restart).await?;
            info!(
                files = summary.files,
                files_skipped = summary.files_skipped,
                rows = summary.rows,
                rows_skipped = summary.rows_skipped,
                stubs = summary.stubs,
                stub_errors = summary.stub_errors,
                duplicates = summary.duplicates,
                submitted = summary.submitted,
                rejected = summary.rejected,
                submit_failed = summary.submit_failed,
                unacknowledged = summary.unacknowledged,
                ledger_entries = summary.ledger_entries,
                "Run finished"
            );
            log_fetch(&summary.fetch);
            info!("Cursor: {:?}", summary.cursor);
            summary.interrupted
        }
        Command::Fetch => {
            let summary = pipeline.fetch_queued().await?;
            log_fetch(&summary);
            false
        }
        Command::Retry { generation, thin } => {
            let summary = pipeline.retry(generation, thin).await?;
            info!(
                generation = summary.generation,
                candidates = summary.candidates,
                from_ledger = summary.from_ledger,
                from_thin_scan = summary.from_thin_scan,
                skipped = summary.skipped,
                submitted = summary.submitted,
                rejected = summary.rejected,
                submit_failed = summary.submit_failed,
                unacknowledged = summary.unacknowledged,
                "Retry finished"
            );
            log_fetch(&summary.fetch);
            false
        }
        Command::ThinScan => {
            let scan = pipeline.thin_scan().await?;
            let top_n = pipeline.config().thin_content.top_n;
            info!(
                scanned = scan.scanned,
                thin = scan.artifacts.len(),
                queueable = scan.candidates(top_n).len(),
                "Thin content scan finished"
            );
            false
        }
        Command::Reconcile => {
            let summary = pipeline.reconcile().await?;
            info!(
                files = summary.files,
                rows = summary.rows,
                missing = summary.missing,
                "Reconcile finished"
            );
            false
        }
        Command::Merge => {
            let summary = pipeline.merge().await?;
            info!(
                copied = summary.copied,
                patched = summary.patched,
                destination = ?pipeline.config().paths.final_store_root,
                "Merge finished"
            );
            false
        }
        Command::Config => false,
    };

    if interrupted || shutdown.is_triggered() {
        Ok(Outcome::Interrupted)
    } else {
        Ok(Outcome::Completed)
    }
}

fn log_fetch(summary: &FetchSummary) {
    info!(
        requested = summary.requested,
        saved = summary.saved,
        failed = summary.failed,
        pending = summary.pending,
        unaccounted = summary.unaccounted,
        write_errors = summary.write_errors,
        "Fetch finished"
    );
}

/// Fire the trigger on the first Ctrl+C or SIGTERM.
async fn forward_shutdown(trigger: ShutdownTrigger) {
    shutdown_signal().await;
    info!("Shutdown requested; finishing in-flight work");
    trigger.trigger();
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
