//! SBS feed bridge CLI
//!
//! Polls an aircraft-position feed and serves it as BaseStation lines to one
//! downstream consumer, building the reference tables on the side.

use clap::Parser;
use sbslink::{
    client::{CenterFilter, ClientConfig, FeedClient},
    server::Listener,
    session::{Bridge, SessionConfig},
    store::ReferenceStore,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_PROVIDER: &str =
    "https://public-api.adsbexchange.com/VirtualRadar/AircraftList.json";

#[derive(Parser)]
#[command(name = "sbslink")]
#[command(about = "Bridges an aircraft-position feed to an SBS consumer", long_about = None)]
struct Cli {
    /// Address the consumer connects to
    #[arg(short, long, default_value = "127.0.0.1:30003")]
    listen: SocketAddr,

    /// Provider endpoint returning an aircraft-list JSON document
    #[arg(long, default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// Center latitude; together with --lon restricts the feed to a radius
    #[arg(long, requires = "lon")]
    lat: Option<f64>,

    /// Center longitude
    #[arg(long, requires = "lat")]
    lon: Option<f64>,

    /// Radius around the center coordinate
    #[arg(long, default_value = "2100")]
    radius: f64,

    /// Directory holding icao24.txt and aircrafts.txt
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Pause after a successful poll, in seconds
    #[arg(long, default_value = "4")]
    poll_interval: u64,

    /// Pause after a failed poll, in seconds
    #[arg(long, default_value = "10")]
    retry_interval: u64,

    /// Feed request timeout, in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SBS feed bridge");
    tracing::info!("Provider: {}", cli.provider);
    tracing::info!("Data directory: {}", cli.data_dir.display());
    tracing::info!(
        "Poll interval: {}s, retry interval: {}s",
        cli.poll_interval,
        cli.retry_interval
    );

    let mut client_config = ClientConfig::new(cli.provider.clone())
        .with_timeout(Duration::from_secs(cli.timeout));

    if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
        tracing::info!("Feed filter: {}nm around {}, {}", cli.radius, lat, lon);
        client_config = client_config.with_filter(CenterFilter::new(lat, lon, cli.radius));
    }

    let client = FeedClient::new(client_config)?;

    // Unreadable reference tables are fatal here: continuing would rewrite
    // them from empty at the first flush.
    let store = ReferenceStore::load(&cli.data_dir)?;

    let listener = Listener::bind(cli.listen).await?;
    tracing::info!("Connect the consumer to {}", listener.local_addr());

    let session_config = SessionConfig {
        poll_interval: Duration::from_secs(cli.poll_interval),
        retry_interval: Duration::from_secs(cli.retry_interval),
    };

    let mut bridge = Bridge::new(client, store, session_config);
    let stats = bridge.stats();

    let shutdown_rx = watch_shutdown();

    bridge.run(listener, shutdown_rx).await?;

    let final_stats = stats.snapshot();
    tracing::info!("Final statistics:");
    tracing::info!("  Sessions served: {}", final_stats.sessions);
    tracing::info!("  Poll ticks: {}", final_stats.polls);
    tracing::info!("  Poll errors: {}", final_stats.poll_errors);
    tracing::info!("  Records forwarded: {}", final_stats.records_sent);
    tracing::info!("  Reference flushes: {}", final_stats.flushes);
    if final_stats.flush_errors > 0 {
        tracing::warn!("  Failed flushes: {}", final_stats.flush_errors);
    }

    Ok(())
}

/// Translate ctrl-c into the shutdown signal the session loop watches.
fn watch_shutdown() -> tokio::sync::watch::Receiver<bool> {
    let (tx, rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        // Sent even if signal registration failed; the loop must not wedge.
        let _ = tx.send(true);
    });

    rx
}
