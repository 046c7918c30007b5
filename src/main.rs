use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;

use newsdesk::config::Config;
use newsdesk::feed::HttpFetcher;
use newsdesk::refresh::RefreshScheduler;
use newsdesk::state::NewsHandle;
use newsdesk::storage::{Database, DatabaseError};

/// Get the config directory path (~/.config/newsdesk/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newsdesk"))
}

#[derive(Parser, Debug)]
#[command(name = "newsdesk", about = "Feed aggregator that publishes one news page")]
struct Args {
    /// Config file (defaults to ~/.config/newsdesk/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh feeds forever (default)
    Run,
    /// Run a single refresh cycle and print feed status as JSON
    Once,
    /// Register a feed under a new name
    Add { name: String, url: String },
    /// List registered feeds
    Feeds,
    /// Print the feed status last written by the refresh loop
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let mut settings = config.refresh_settings().context("Invalid configuration")?;
    let status_path = settings
        .status_path
        .get_or_insert_with(|| config_dir.join("status.json"))
        .clone();

    let db_path = config
        .database_path
        .clone()
        .unwrap_or_else(|| config_dir.join("newsdesk.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: Another instance of newsdesk appears to be running.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let handle = NewsHandle::open(db).await.context("Failed to load feeds")?;

    match args.command.unwrap_or(Command::Run) {
        Command::Add { name, url } => {
            let entry = handle.register(&name, &url).await?;
            println!("Added {} ({}); it will be fetched on the next refresh", entry.name, entry.url);
        }
        Command::Status => {
            let json = std::fs::read_to_string(&status_path).with_context(|| {
                format!(
                    "No status at {} (is `newsdesk run` running?)",
                    status_path.display()
                )
            })?;
            println!("{}", json.trim_end());
        }
        Command::Feeds => {
            for entry in handle.feeds().await {
                println!("{}\t{}", entry.name, entry.url);
            }
        }
        Command::Once => {
            let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
            let scheduler = RefreshScheduler::new(handle.clone(), fetcher, settings);
            let report = scheduler.run_cycle().await;
            let status = handle.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if !report.published {
                eprintln!("No feed produced items; snapshot not updated");
            }
        }
        Command::Run => {
            let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
            let feed_count = handle.feeds().await.len();
            tracing::info!(
                feeds = feed_count,
                interval_secs = settings.interval.as_secs(),
                "Starting refresh loop"
            );

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let scheduler = RefreshScheduler::new(handle, fetcher, settings);
            let task = tokio::spawn(scheduler.run(shutdown_rx));

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            tracing::info!("Shutdown requested, finishing current cycle");
            let _ = shutdown_tx.send(true);
            task.await.context("Refresh loop panicked")?;
        }
    }

    Ok(())
}
