//! mirror-sync - Daemon mirroring a source account to Mastodon
//!
//! Runs sync cycles on a fixed interval: fetch the newest source posts,
//! select the ones not yet mirrored, and publish them oldest first.

use clap::Parser;
use libmirrorcast::config::Config;
use libmirrorcast::error::{ConfigError, PlatformError};
use libmirrorcast::logging::{LogFormat, LoggingConfig};
use libmirrorcast::platforms::mastodon::MastodonClient;
use libmirrorcast::source::JsonFeedSource;
use libmirrorcast::sync::{SyncOptions, SyncReport, Syncer};
use libmirrorcast::{MirrorError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "mirror-sync")]
#[command(version)]
#[command(about = "Mirror a source account's posts to Mastodon")]
#[command(long_about = "\
mirror-sync - Mirror a source account's posts to Mastodon

DESCRIPTION:
    mirror-sync is a long-running daemon that periodically reads the
    newest posts of the configured source account and republishes the
    ones not yet mirrored to Mastodon, oldest first.

    Replies within the author's own threads are posted as replies on
    Mastodon, and quotes of the author's own posts link to the mirrored
    copy. Every mirrored post is recorded in the cross-reference cache
    right after it is published, so nothing is posted twice.

USAGE:
    # Run in foreground (logs to stderr)
    mirror-sync

    # Run a single cycle and exit
    mirror-sync --once

    # Show what would be posted without posting anything
    mirror-sync --once --dry-run

    # Poll every 10 minutes with JSON logs
    mirror-sync --poll-interval 600 --log-format json

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current sync cycle)

CONFIGURATION:
    Configuration file: ~/.config/mirrorcast/config.toml
    Override with MIRRORCAST_CONFIG.

    [source]
    username = \"example\"
    feed_file = \"~/.local/share/mirrorcast/feed.json\"

    [mastodon]
    enabled = true
    instance = \"mastodon.social\"
    token_file = \"~/.config/mirrorcast/mastodon.token\"

    [sync]
    window = \"1day\"
    poll_interval = \"5m\"

    [cache]
    backend = \"json\"
    path = \"~/.local/share/mirrorcast/cache.json\"

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime or configuration error
    2 - Authentication error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "Seconds between sync cycles (default: sync.poll_interval)")]
    poll_interval: Option<u64>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Compose posts and log them without publishing or updating the cache
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Log output format
    #[arg(long, value_name = "FORMAT", default_value = "text", env = "MIRRORCAST_LOG_FORMAT")]
    #[arg(value_parser = ["text", "json", "pretty"])]
    log_format: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let format = cli.log_format.parse().unwrap_or(LogFormat::Text);
    let level = std::env::var("MIRRORCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    LoggingConfig::new(format, level, cli.verbose).init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut syncer = build_syncer(&config, cli.dry_run).await?;

    info!("mirror-sync starting");
    syncer.authenticate().await?;

    if cli.once {
        let report = syncer.run_cycle(chrono::Utc::now()).await?;
        log_report(&report);

        if let Some(failed) = report.failed {
            return Err(PlatformError::Posting(format!(
                "post {} was not mirrored: {}",
                failed.source_id, failed.error
            ))
            .into());
        }
        return Ok(());
    }

    let poll_interval = match cli.poll_interval {
        Some(seconds) => Duration::from_secs(seconds),
        None => config.sync.poll_interval()?,
    };
    info!("Poll interval: {}s", poll_interval.as_secs());

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    run_daemon_loop(&syncer, poll_interval, shutdown).await;

    info!("mirror-sync stopped");
    Ok(())
}

async fn build_syncer(config: &Config, dry_run: bool) -> Result<Syncer> {
    let mastodon = match &config.mastodon {
        Some(mastodon) if mastodon.enabled => mastodon,
        Some(_) => {
            return Err(ConfigError::InvalidValue {
                field: "mastodon.enabled".to_string(),
                reason: "no destination is enabled".to_string(),
            }
            .into())
        }
        None => return Err(ConfigError::MissingField("mastodon".to_string()).into()),
    };

    let platform = MastodonClient::from_config(mastodon)?;
    let source = JsonFeedSource::new(&config.source.feed_file);
    let store = config.cache.open_store().await?;

    let mut options = SyncOptions::from_config(config)?;
    options.dry_run = dry_run;

    Ok(Syncer::new(
        Box::new(source),
        Box::new(platform),
        store,
        options,
    ))
}

#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| MirrorError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    warn!("Graceful shutdown on signals is only supported on Unix");
    Ok(())
}

/// Run cycles until shutdown is requested
///
/// A failed cycle is logged and retried on the next tick.
async fn run_daemon_loop(syncer: &Syncer, poll_interval: Duration, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        match syncer.run_cycle(chrono::Utc::now()).await {
            Ok(report) => log_report(&report),
            Err(e) if e.is_transient() => warn!("Sync cycle failed, will retry: {}", e),
            Err(e) => error!("Sync cycle failed: {}", e),
        }

        // Sleep until next cycle (check shutdown every second)
        for _ in 0..poll_interval.as_secs().max(1) {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

fn log_report(report: &SyncReport) {
    let verb = if report.dry_run { "previewed" } else { "mirrored" };

    info!(
        "Cycle done: {} candidate(s), {} {}, {} skipped",
        report.candidates,
        report.published.len(),
        verb,
        report.skipped.len()
    );

    for reference in &report.unresolved {
        warn!("Degraded post: {}", reference);
    }

    if let Some(failed) = &report.failed {
        warn!(
            "Stopped at {}: {} (retrying next cycle)",
            failed.source_id, failed.error
        );
    }
}
