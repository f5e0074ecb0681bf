use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_sync::{
    config::Config,
    database::Database,
    ingestor::{
        FormatDetector, M3uParser, ParserKind, SubscriptionSynchronizer, SyncScheduler,
        SyncStateManager, SyncTrigger, TracingInterceptor,
    },
    models::{ChannelFilter, SyncState},
    sources::{HttpPlaylistFetcher, PlaylistFetcher},
    utils::UrlUtils,
};

#[derive(Parser)]
#[command(name = "m3u-sync")]
#[command(version)]
#[command(about = "Keep local IPTV channel lists in sync with M3U playlist subscriptions")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add or rename a subscription and sync it now
    Subscribe { title: String, url: String },
    /// Sync every stored subscription once
    SyncAll,
    /// List subscriptions
    List,
    /// Print stored channels
    Channels {
        /// Only channels of this subscription
        #[arg(long, value_name = "URL")]
        subscription: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Mark a stream URL as favourite
    Favourite {
        stream_url: String,
        #[arg(long)]
        remove: bool,
    },
    /// Remove a subscription and its channels
    Unsubscribe { url: String },
    /// Parse a playlist file or URL without storing it
    Parse {
        source: String,
        #[arg(long)]
        json: bool,
    },
    /// Run the sync scheduler until interrupted
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("m3u_sync={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from specified file
    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let fetcher: Arc<dyn PlaylistFetcher> = Arc::new(HttpPlaylistFetcher::new(&config.sync)?);

    match cli.command {
        Command::Parse { source, json } => parse_playlist(fetcher.as_ref(), &source, json).await,
        command => run_with_store(command, config, fetcher).await,
    }
}

async fn run_with_store(
    command: Command,
    config: Config,
    fetcher: Arc<dyn PlaylistFetcher>,
) -> Result<()> {
    info!("Using database: {}", config.database.url);
    let database = Database::new(&config.database).await?;
    database.migrate().await?;

    let synchronizer = SubscriptionSynchronizer::new(
        fetcher,
        Arc::new(database.clone()),
        SyncStateManager::new(),
    );
    let shutdown = CancellationToken::new();
    spawn_ctrl_c_handler(shutdown.clone());

    match command {
        Command::Subscribe { title, url } => {
            let mut states = synchronizer.sync_with_cancellation(&title, &url, shutdown);
            while let Some(state) = states.next().await {
                match state {
                    SyncState::Loading => {
                        println!("Syncing {} ...", UrlUtils::obfuscate_credentials(&url))
                    }
                    SyncState::Success(summary) => println!(
                        "Stored {} channels ({} replaced)",
                        summary.channels_saved, summary.channels_removed
                    ),
                    SyncState::Failure { reason } => bail!(reason),
                }
            }
        }
        Command::SyncAll => {
            let subscriptions = database.list_subscriptions().await?;
            let mut failed = 0;
            for subscription in &subscriptions {
                match synchronizer
                    .sync_to_completion(
                        &subscription.title,
                        &subscription.url,
                        SyncTrigger::Manual,
                        shutdown.child_token(),
                    )
                    .await
                {
                    Ok(summary) => println!(
                        "{}: {} channels",
                        subscription.title, summary.channels_saved
                    ),
                    Err(e) => {
                        failed += 1;
                        println!("{}: failed: {}", subscription.title, e);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} subscriptions failed to sync", failed, subscriptions.len());
            }
        }
        Command::List => {
            for subscription in database.list_subscriptions().await? {
                let last_synced = subscription
                    .last_synced_at
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}\t{}\tlast synced: {}",
                    subscription.title,
                    UrlUtils::obfuscate_credentials(&subscription.url),
                    last_synced
                );
            }
        }
        Command::Channels { subscription, json } => {
            let filter = subscription
                .map(ChannelFilter::Subscription)
                .unwrap_or(ChannelFilter::All);
            let channels = database.get_channels(&filter).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&channels)?);
            } else {
                for channel in channels {
                    let marker = if channel.favourite { "*" } else { " " };
                    println!(
                        "{} {}\t{}\t{}",
                        marker, channel.record.group, channel.record.title, channel.record.stream_url
                    );
                }
            }
        }
        Command::Favourite { stream_url, remove } => {
            let changed = database.set_favourite(&stream_url, !remove).await?;
            if !changed {
                println!("Nothing to change for {}", stream_url);
            }
        }
        Command::Unsubscribe { url } => {
            if !database.unsubscribe(&url).await? {
                bail!("No subscription for {}", UrlUtils::obfuscate_credentials(&url));
            }
        }
        Command::Schedule => {
            let scheduler = SyncScheduler::new(synchronizer, &config.sync)?;
            scheduler.start(shutdown).await?;
        }
        Command::Parse { .. } => bail!("parse does not use the channel store"),
    }

    Ok(())
}

fn spawn_ctrl_c_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });
}

/// Print the records of a local file or remote playlist.
async fn parse_playlist(fetcher: &dyn PlaylistFetcher, source: &str, json: bool) -> Result<()> {
    let (content, kind) = if Path::new(source).exists() {
        let content = tokio::fs::read(source)
            .await
            .with_context(|| format!("Failed to read {source}"))?;
        let content = String::from_utf8_lossy(&content).into_owned();
        let file_url = std::fs::canonicalize(source)
            .ok()
            .and_then(|path| url::Url::from_file_path(path).ok());
        let kind = file_url
            .and_then(|url| FormatDetector::classify(url.as_str()))
            .or_else(|| FormatDetector::sniff(&content));
        (content, kind)
    } else {
        let kind = FormatDetector::classify(source);
        (fetcher.fetch(source).await?, kind)
    };

    let Some(kind) = kind else {
        bail!("{} does not look like an M3U playlist", source);
    };

    let tracer = TracingInterceptor::new(source);
    let outcome = match kind {
        ParserKind::M3u | ParserKind::M3u8 => M3uParser::parse_str(&content, &[&tracer]),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.records)?);
    } else {
        for record in &outcome.records {
            println!("{}\t{}\t{}", record.group, record.title, record.stream_url);
        }
        println!(
            "{} channels, {} entries discarded",
            outcome.stats.records, outcome.stats.discarded
        );
    }
    Ok(())
}
