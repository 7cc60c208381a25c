//! Outbound Resilience probe (v1)
//!
//! Issues one HTTP request through the resilience pipeline and reports how it ended.
//!
//! # Architecture Overview
//!
//! ```text
//!     CLI args + config file
//!            │
//!            ▼
//!     ┌──────────────────┐    ┌─────────────────┐    ┌──────────────┐    ┌─────────────┐
//!     │ ResilientClient  │───▶│ CircuitBreaker  │───▶│ RetryExecutor│───▶│TimeoutGuard │───▶ Upstream
//!     │ (per operation)  │    │ (registry, key) │    │  (backoff)   │    │ (per try)   │
//!     └──────────────────┘    └─────────────────┘    └──────────────┘    └─────────────┘
//!            │
//!            ▼
//!     response, or classified failure + disposition
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use clap::Parser;
use reqwest::Method;

use outbound_resilience::config::{load_config, ConfigWatcher, ResilienceConfig};
use outbound_resilience::observability::{init_logging, MetricsObserver};
use outbound_resilience::resilience::{Backoff, Disposition};
use outbound_resilience::ResilientClient;

#[derive(Parser)]
#[command(name = "outbound-resilience")]
#[command(about = "Send a request through the outbound resilience pipeline", long_about = None)]
struct Cli {
    /// Target URL
    target: String,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Operation name; selects the breaker and per-operation overrides
    #[arg(short, long, default_value = "default")]
    operation: String,

    /// HTTP method
    #[arg(short, long, default_value = "GET", value_parser = parse_method)]
    method: Method,

    /// JSON payload
    #[arg(short, long)]
    data: Option<String>,

    /// Send the request this many times, sharing breaker state
    #[arg(short = 'n', long, default_value_t = 1)]
    repeat: u32,

    /// Pause between repeated requests, in milliseconds
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Reload the config file when it changes (with --repeat)
    #[arg(short, long)]
    watch: bool,
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|e| format!("invalid method `{}`: {}", raw, e))
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };

    init_logging(&config.logging)?;

    let retry = config.retry_for(&cli.operation);
    tracing::info!(
        operation = %cli.operation,
        failure_threshold = config.breaker_for(&cli.operation).failure_threshold,
        max_attempts = retry.max_attempts,
        max_backoff = ?Backoff::from_config(&retry).max_total_delay(retry.max_attempts),
        timeout = ?config.timeout_for(&cli.operation),
        "Configuration loaded"
    );

    let payload = match &cli.data {
        Some(raw) => Some(serde_json::from_str::<serde_json::Value>(raw)?),
        None => None,
    };

    let client = ResilientClient::new(config).with_observer(Arc::new(MetricsObserver::new()));

    // Keep the watcher alive for the whole run.
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            client.spawn_config_updates(updates);
            Some(watcher.run()?)
        }
        (None, true) => {
            tracing::warn!("--watch needs --config, ignoring");
            None
        }
        _ => None,
    };

    let mut exit = ExitCode::SUCCESS;
    for round in 0..cli.repeat.max(1) {
        if round > 0 && cli.interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(cli.interval_ms)).await;
        }
        match client
            .request(&cli.operation, cli.method.clone(), &cli.target, payload.clone())
            .await
        {
            Ok(response) => {
                println!("{}", response.status);
                println!("{}", response.body);
                exit = ExitCode::SUCCESS;
            }
            Err(failure) => {
                let (message, code) = match failure.disposition() {
                    Disposition::ServiceUnavailable => ("service temporarily unavailable", 1),
                    Disposition::InvalidRequest => ("invalid request", 2),
                };
                eprintln!("Error: {}", failure);
                eprintln!("{}", message);
                exit = ExitCode::from(code);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&client.snapshots())?);
    Ok(exit)
}
