//! autopipeline-load: 并发负载驱动，观察请求合并效果
//!
//! Usage:
//!   autopipeline-load [help]
//!
//! Starts an in-memory backend, fires concurrent callers over a fixed key
//! space through the auto-pipeline and prints the engine counters as JSON.

use anyhow::Context;
use autopipeline::backend::MemoryBackend;
use autopipeline::{AutoPipeline, PipelineConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CALLERS: usize = 1_000;
const DEFAULT_KEYS: usize = 16;
const DEFAULT_LATENCY_US: u64 = 200;

fn print_usage() {
    println!(
        r#"autopipeline-load: 自动流水线负载驱动

USAGE:
    autopipeline-load

ENVIRONMENT:
    AUTOPIPELINE_CALLERS           Concurrent callers (default {DEFAULT_CALLERS})
    AUTOPIPELINE_KEYS              Distinct keys (default {DEFAULT_KEYS})
    AUTOPIPELINE_LATENCY_US        Simulated backend latency (default {DEFAULT_LATENCY_US})
    AUTOPIPELINE_TTL_US            Engine ttl
    AUTOPIPELINE_MAX_SIZE          Engine size threshold
    AUTOPIPELINE_POLL_INTERVAL_US  Engine poll interval
    RUST_LOG                       Log filter (e.g. autopipeline=debug)"#
    );
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args()
        .nth(1)
        .is_some_and(|a| matches!(a.as_str(), "help" | "--help" | "-h"))
    {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let callers = env_or("AUTOPIPELINE_CALLERS", DEFAULT_CALLERS).max(1);
    let keys = env_or("AUTOPIPELINE_KEYS", DEFAULT_KEYS).max(1);
    let latency = Duration::from_micros(env_or("AUTOPIPELINE_LATENCY_US", DEFAULT_LATENCY_US));
    let config = PipelineConfig::from_env();

    let backend = Arc::new(MemoryBackend::with_latency(latency));
    for k in 0..keys {
        backend.hset(format!("user:{k}"), "name", format!("user-{k}"));
    }

    let client = AutoPipeline::builder()
        .executor(backend.clone())
        .config(config.clone())
        .build()
        .context("starting auto-pipeline")?;
    info!(callers, keys, ?config, "load started");

    let started = Instant::now();
    let tasks = (0..callers).map(|n| {
        let client = client.clone();
        tokio::spawn(async move { client.hget(format!("user:{}", n % keys), "name").await })
    });
    let mut failures = 0usize;
    for res in futures::future::join_all(tasks).await {
        if res.context("caller task panicked")?.is_err() {
            failures += 1;
        }
    }
    let elapsed = started.elapsed();

    client.shutdown().await.context("shutting down")?;

    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        round_trips = backend.round_trips(),
        submitted = backend.submitted(),
        failures,
        "load finished"
    );
    println!("{}", client.stats().to_json()?);
    Ok(())
}
