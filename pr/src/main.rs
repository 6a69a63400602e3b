//! PushRelay - branch push relay
//!
//! CLI entry point: runs the poll loop, a single cycle, or watermark maintenance.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pushrelay::cli::{Cli, Command, WatermarkCommand};
use pushrelay::config::Config;
use pushrelay::{CycleOutcome, GithubFeed, HttpWebhook, Relay, SqliteWatermarkStore, WatermarkStore};

fn parse_level(level: Option<&str>) -> tracing::Level {
    match level.map(|s| s.to_uppercase()).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, to_stderr: bool) -> Result<()> {
    // Priority: CLI --log-level > config file > INFO
    let level = parse_level(cli_log_level.or(config_log_level));
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        let log_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pushrelay")
            .join("logs");
        fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

        let log_file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("pushrelay.log"))
            .context("Failed to open log file")?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), cli.log_stderr)
        .context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        repository = %config.source.repository,
        target_ref = %config.source.target_ref,
        "PushRelay loaded config"
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(&config).await,
        Command::Once => cmd_once(&config).await,
        Command::Watermark { command } => match command {
            WatermarkCommand::Show => cmd_watermark_show(&config),
            WatermarkCommand::Set { id } => cmd_watermark_set(&config, id),
        },
    }
}

fn open_store(config: &Config) -> Result<Arc<SqliteWatermarkStore>> {
    let store = SqliteWatermarkStore::open(&config.storage.path)
        .context(format!("Failed to open watermark store at {}", config.storage.path.display()))?;
    Ok(Arc::new(store))
}

fn build_relay(config: &Config, store: Arc<dyn WatermarkStore>) -> Result<Relay> {
    config.validate()?;

    let source = &config.source;
    let feed = GithubFeed::new(
        source.events_url(),
        &source.token()?,
        source.page_size(),
        config.poll.timeout(),
    )
    .context("Failed to create feed client")?;
    info!(url = %feed.url(), target_ref = %source.target_ref, "Polling events feed");
    let sink =
        HttpWebhook::new(config.webhook.url()?, config.poll.timeout()).context("Failed to create webhook client")?;

    Ok(Relay::new(
        Arc::new(feed),
        Arc::new(sink),
        store,
        &source.target_ref,
        &source.html_base_url,
    ))
}

/// Poll until SIGINT/SIGTERM
async fn cmd_run(config: &Config) -> Result<()> {
    debug!("cmd_run: called");
    let store = open_store(config)?;
    let relay = build_relay(config, store)?;
    let interval = config.poll.interval();

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let mut relay_handle = tokio::spawn(async move { relay.run(interval, shutdown_rx).await });

    info!("Relay running. Press Ctrl+C to stop.");

    tokio::select! {
        // The relay only returns on its own when the store fails
        result = &mut relay_handle => {
            result.context("Relay task panicked")?.context("Relay stopped")?;
            return Ok(());
        }
        signal = wait_for_shutdown() => {
            signal?;
            let _ = shutdown_tx.send(()).await;
        }
    }

    info!("Waiting for in-flight cycle to finish...");
    relay_handle
        .await
        .context("Relay task panicked")?
        .context("Relay stopped")?;

    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        warn!("Ctrl+C received");
    }

    Ok(())
}

/// Run one cycle and report what happened
async fn cmd_once(config: &Config) -> Result<()> {
    debug!("cmd_once: called");
    let store = open_store(config)?;
    let relay = build_relay(config, store)?;

    match relay.poll_once().await.context("Relay stopped")? {
        CycleOutcome::FetchFailed(message) => {
            println!("{} Failed to fetch events: {}", "✗".red(), message);
        }
        CycleOutcome::NoPushEvents => {
            println!("No push events on {}", config.source.target_ref.cyan());
        }
        CycleOutcome::NoNewEvents => {
            println!("No new events since last check");
        }
        CycleOutcome::Delivered(report) => {
            println!(
                "{} Watermark advanced to {}",
                "✓".green(),
                report.watermark.to_string().cyan()
            );
            for id in &report.delivered {
                println!("  {} {}", "sent".green(), id);
            }
            for id in &report.failed {
                println!("  {} {}", "failed".red(), id);
            }
            for id in &report.skipped {
                println!("  {} {}", "skipped".yellow(), id);
            }
            for id in &report.malformed {
                println!("  {} {}", "malformed".yellow(), id);
            }
        }
    }
    Ok(())
}

fn cmd_watermark_show(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    match store.get()? {
        Some(id) => println!("{}", id),
        None => println!("{}", "unset".dimmed()),
    }
    Ok(())
}

fn cmd_watermark_set(config: &Config, id: u64) -> Result<()> {
    let store = open_store(config)?;
    let previous = store.get()?;
    store.set(id)?;
    warn!(?previous, watermark = id, path = %store.path().display(), "Watermark overridden by operator");
    println!(
        "{} Watermark set to {} in {}",
        "✓".green(),
        id.to_string().cyan(),
        store.path().display()
    );
    Ok(())
}
