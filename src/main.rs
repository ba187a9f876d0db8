use anyhow::Context;
use clap::Parser;
use destpool::client::{HttpClient, LoopbackConnector};
use destpool::config::Config;
use destpool::{DestPoolError, ExchangeResult, Request, ResponseListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[cfg(feature = "fast-allocator")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "destpool")]
#[command(about = "Drive a simulated workload through per-destination connection pools", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Generate example configuration file
    #[arg(long, value_name = "FILE")]
    generate_config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Number of requests to send
    #[arg(long, default_value_t = 200)]
    requests: usize,

    /// Number of distinct destinations to spread requests over
    #[arg(long, default_value_t = 2)]
    destinations: usize,

    /// Abort every Nth request right after queueing it
    #[arg(long, value_name = "N")]
    abort_every: Option<usize>,

    /// Seconds to wait for outstanding exchanges
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

struct Completion(mpsc::UnboundedSender<ExchangeResult>);

impl ResponseListener for Completion {
    fn on_complete(&self, result: &ExchangeResult) {
        let _ = self.0.send(result.clone());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle config generation
    if let Some(config_path) = args.generate_config {
        println!("Generating example configuration file: {:?}", config_path);
        Config::create_example(&config_path)?;
        println!("Example configuration file created successfully!");
        println!("Edit the file and run: destpool --config {:?}", config_path);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level, &config.logging.format)?;

    info!("destpool v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Limits: {} connections, {} queued requests per destination",
        config.client.max_connections_per_address, config.client.max_queue_size_per_address
    );

    let connector = Arc::new(LoopbackConnector::new(
        config.loopback.clone(),
        Handle::current(),
    ));
    let client = HttpClient::builder(config.client.clone())
        .name("destpool")
        .connector(connector.clone())
        .build()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let destinations = args.destinations.max(1);
    let start = Instant::now();
    let mut accepted = 0usize;
    let mut rejected = 0usize;
    let mut aborted = 0usize;

    for i in 0..args.requests {
        let host = format!("svc-{}.local", i % destinations);
        let request = Arc::new(Request::new("http", host).with_path(format!("/item/{}", i)));

        match client.send(Arc::clone(&request), Arc::new(Completion(tx.clone()))) {
            Ok(()) => {
                accepted += 1;
                if args.abort_every.is_some_and(|n| n > 0 && i % n == 0) {
                    let destination = client.destination(request.scheme(), request.host(), None)?;
                    if destination.abort(&request, "Aborted by workload") {
                        aborted += 1;
                    }
                }
            }
            Err(e) if e.is_rejection() => {
                warn!("Request {} rejected: {}", i, e);
                rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    drop(tx);

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let deadline = Duration::from_secs(args.timeout_secs);
    for _ in 0..accepted {
        match tokio::time::timeout(deadline, rx.recv()).await {
            Ok(Some(result)) if result.is_failed() => failed += 1,
            Ok(Some(_)) => succeeded += 1,
            Ok(None) => break,
            Err(_) => {
                warn!("Timed out waiting for outstanding exchanges");
                break;
            }
        }
    }

    for destination in client.destinations() {
        println!("{}", serde_json::to_string_pretty(&destination.stats())?);
        print!("{}", destination.dump());
    }

    info!(
        "Sent {} requests in {:?}: {} succeeded, {} failed ({} aborted), {} rejected, {} connections created",
        args.requests,
        start.elapsed(),
        succeeded,
        failed,
        aborted,
        rejected,
        connector.created()
    );

    client.stop();
    Ok(())
}

fn init_logging(level: &str, format: &str) -> destpool::Result<()> {
    let env_filter = EnvFilter::try_new(level)
        .map_err(|e| DestPoolError::Config(format!("Invalid log level: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    Ok(())
}
