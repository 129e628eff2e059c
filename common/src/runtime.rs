use anyhow::{Context, Result};
use log::info;
use tokio::runtime::{Builder, Runtime};

pub const WORKER_THREADS_ENV: &str = "HARNESS_THREADS";

/// Builds the fixed worker pool producer and consumer tasks are scheduled on.
///
/// An explicit `worker_threads` wins over the `HARNESS_THREADS` environment variable, otherwise
/// tokio picks one worker per core.
pub fn build_worker_pool(worker_threads: Option<usize>) -> Result<Runtime> {
    let mut builder = Builder::new_multi_thread();

    builder.enable_all();

    let worker_threads = match worker_threads {
        Some(worker_threads) => Some(worker_threads),
        None => worker_threads_from_env()?,
    };

    if let Some(worker_threads) = worker_threads {
        builder.worker_threads(worker_threads.max(1));
    }

    info!("{:?}", builder);

    builder
        .build()
        .context("Failed to build the worker pool runtime")
}

fn worker_threads_from_env() -> Result<Option<usize>> {
    std::env::var(WORKER_THREADS_ENV)
        .ok()
        .map(|value| parse_worker_threads(&value))
        .transpose()
}

fn parse_worker_threads(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .with_context(|| format!("{} must be a valid number, got {:?}", WORKER_THREADS_ENV, value))
}
