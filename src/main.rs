//! CLI entry point: periodically rebuilds the GTFS-Realtime feed from the
//! MHD live API until interrupted.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use clap::Parser;
use mhd_gtfs_rt::{
    fetch::{BasicClient, MhdApi},
    output::FileSink,
    refresh::{RefreshLoop, RefreshSettings},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "mhd_gtfs_rt")]
#[command(about = "Run periodic GTFS-Realtime feed build", long_about = None)]
struct Cli {
    /// Prefix to strip from GTFS trip short name when matching against MHD API output
    #[arg(long, env = "LINE_NR_PREFIX", default_value = "6550")]
    line_nr_prefix: String,

    /// MHD realtime API key
    #[arg(long, env = "MHD_API_KEY", hide_env_values = true)]
    mhd_api_key: String,

    /// Root URL of MHD API
    #[arg(long, env = "MHD_API_ROOT", default_value = "https://mhd.kacis.eu/api")]
    mhd_api_root: String,

    /// The GTFS trips.txt file location
    #[arg(long, env = "GTFS_TRIPS_SRC_FILE")]
    gtfs_trips_src_file: PathBuf,

    /// The GTFS-Realtime output file location
    #[arg(long, env = "DEST_FILE", default_value = "gtfs.pb")]
    dest_file: PathBuf,

    /// How often should the feed be refreshed in seconds
    #[arg(long, env = "REFRESH_PERIOD_SECS", default_value_t = 10)]
    refresh_period_secs: u64,

    /// Give up on an MHD API request after this many seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Time zone of the timestamps reported by the MHD API
    #[arg(long, env = "FEED_TIMEZONE", default_value = "Europe/Prague")]
    timezone: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/mhd_gtfs_rt.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("mhd_gtfs_rt.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let timezone: Tz = cli
        .timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid time zone {:?}: {}", cli.timezone, e))?;

    let client = BasicClient::with_timeout(Duration::from_secs(cli.request_timeout_secs))
        .context("Failed to build HTTP client")?;
    let source = MhdApi::new(client, &cli.mhd_api_root, cli.mhd_api_key)?;

    info!(
        api = %source.buses_url(),
        trips = %cli.gtfs_trips_src_file.display(),
        dest = %cli.dest_file.display(),
        refresh_period_secs = cli.refresh_period_secs,
        %timezone,
        "Starting feed builder"
    );

    let refresh = RefreshLoop::new(
        RefreshSettings {
            trips_path: cli.gtfs_trips_src_file,
            line_nr_prefix: cli.line_nr_prefix,
            timezone,
            interval: Duration::from_secs(cli.refresh_period_secs),
        },
        source,
        FileSink::new(cli.dest_file),
    );

    // Listen from the start so an interrupt mid-cycle still ends the loop at
    // the next boundary.
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl+C, running without shutdown");
            std::future::pending::<()>().await;
        }
        let _ = stop_tx.send(());
    });

    refresh
        .run(async {
            let _ = stop_rx.await;
        })
        .await;

    Ok(())
}
