use std::process;
use std::sync::Arc;

use base64::Engine;
use catalog_core::{JsonCheckpointStore, Metrics, RateGate, RetryPolicy, SledJobQueue};
use clap::Parser;
use commands::Commands;
use connectors::{FsObjectStore, HttpRemoteCatalog};
use error::CliError;
use runtime::{RuntimeConfig, Supervisor};
use shutdown::{ExitCode, ShutdownCoordinator};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};

mod commands;
mod env;
mod error;
mod shutdown;

#[derive(Parser)]
#[command(name = "catalog-sync", version = "0.1.0", about = "Catalog feed synchronization pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let exit_code = match run_cli().await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => {
            info!("application shut down gracefully");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!(error = %err, "application error");
            ExitCode::GeneralError
        }
    };

    process::exit(exit_code.as_i32());
}

async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { env_file } => run_sync(env_file.as_deref()).await,
        Commands::Progress { feed, env_file, json } => show_progress(env_file.as_deref(), feed.as_deref(), json).await,
    }
}

async fn run_sync(env_file: Option<&str>) -> Result<(), CliError> {
    let loader = env::init_env(env_file)?;
    let config = RuntimeConfig::from_env(&loader)?;

    let cancel = CancellationToken::new();
    let shutdown = ShutdownCoordinator::new(cancel.clone());
    shutdown.register_handlers();

    let object_store = Arc::new(FsObjectStore::new(config.object_store_root.clone()));
    let checkpoint_path = std::path::Path::new(&config.state_dir).join("process_checkpoint.json");
    let checkpoint = Arc::new(JsonCheckpointStore::open(checkpoint_path).await.map_err(runtime::SupervisorError::from)?);
    let queue_path = std::path::Path::new(&config.state_dir).join("queue");
    let queue = Arc::new(SledJobQueue::open(queue_path).map_err(|err| CliError::Config(err.to_string()))?);
    let remote = Arc::new(build_remote_catalog(&config));
    let metrics = Metrics::new();

    let supervisor = Supervisor::new(object_store, checkpoint, queue, remote, config, metrics);
    let result = supervisor.run(cancel.clone()).await;

    if shutdown.is_shutdown_requested() {
        info!("sync stopped by shutdown signal; progress has been saved");
        return Err(CliError::ShutdownRequested);
    }

    result.map_err(CliError::from)
}

fn build_remote_catalog(config: &RuntimeConfig) -> HttpRemoteCatalog {
    let credentials = format!("{}:{}", config.api_consumer_key, config.api_consumer_secret);
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::AUTHORIZATION,
        reqwest::header::HeaderValue::from_str(&format!("Basic {encoded}")).expect("header value is valid ASCII"),
    );

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .expect("failed to build HTTP client");

    let rate_gate = RateGate::new(config.rate_gate_max_concurrent, config.rate_gate_min_spacing, RetryPolicy::default());

    HttpRemoteCatalog::new(client, config.api_base_url.clone(), rate_gate)
}

async fn show_progress(env_file: Option<&str>, feed: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let loader = env::init_env(env_file)?;
    let config = RuntimeConfig::from_env(&loader)?;

    let checkpoint_path = std::path::Path::new(&config.state_dir).join("process_checkpoint.json");
    let checkpoint = Arc::new(JsonCheckpointStore::open(checkpoint_path).await.map_err(runtime::SupervisorError::from)?);
    let service = runtime::ProgressService::new(checkpoint);

    match feed {
        Some(feed_key) => {
            let progress = service.feed_progress(feed_key).await;
            match progress {
                Some(progress) => print_feed_progress(&progress, as_json)?,
                None => println!("no progress recorded yet for feed '{feed_key}'"),
            }
        }
        None => {
            let overall = service.overall_progress().await;
            if as_json {
                let json = serde_json::to_string_pretty(&overall).map_err(CliError::JsonSerialize)?;
                println!("{json}");
            } else {
                println!("all feeds complete: {}", overall.all_complete);
                for feed in &overall.feeds {
                    print_feed_progress(feed, false)?;
                }
            }
        }
    }

    Ok(())
}

fn print_feed_progress(progress: &runtime::FeedProgress, as_json: bool) -> Result<(), CliError> {
    if as_json {
        let json = serde_json::to_string_pretty(progress).map_err(CliError::JsonSerialize)?;
        println!("{json}");
    } else {
        println!(
            "{:<24} row {}/{}  updated={} skipped={} failed={} complete={}",
            progress.feed_key,
            progress.last_processed_row,
            progress.total_rows,
            progress.updated,
            progress.skipped,
            progress.failed,
            progress.complete
        );
    }
    Ok(())
}
