use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};
use tokio::task::{JoinError, JoinSet};

use crate::{
    AdapterKind, BenchmarkResult, CollectionAdapter, HarnessError, HarnessOptions, HarnessResult,
};

/// Drives a collection with concurrent producers and a single draining consumer, then checks
/// that every produced item came out the other side.
pub struct BenchmarkHarness {
    options: HarnessOptions,
}

impl BenchmarkHarness {
    pub fn new(options: HarnessOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &HarnessOptions {
        &self.options
    }

    pub async fn run<T, A>(
        &self,
        description: &str,
        producer_count: usize,
        input: Arc<[T]>,
        adapter: Arc<A>,
    ) -> HarnessResult<BenchmarkResult>
    where
        T: Clone + Send + Sync + 'static,
        A: CollectionAdapter<T> + ?Sized + 'static,
    {
        let (result, _output) = self
            .run_collecting(description, producer_count, input, adapter)
            .await?;

        Ok(result)
    }

    /// Same as `run`, also returning every item the consumer drained, in drain order.
    pub async fn run_collecting<T, A>(
        &self,
        description: &str,
        producer_count: usize,
        input: Arc<[T]>,
        adapter: Arc<A>,
    ) -> HarnessResult<(BenchmarkResult, Vec<T>)>
    where
        T: Clone + Send + Sync + 'static,
        A: CollectionAdapter<T> + ?Sized + 'static,
    {
        validate(description, producer_count)?;

        info!(
            "Starting run: {}, Items: {}, Producers: {}",
            description,
            input.len(),
            producer_count
        );

        let start = Instant::now();
        let producers_active = Arc::new(AtomicBool::new(true));

        let mut producers = JoinSet::new();
        for range in partition(input.len(), producer_count) {
            let input = input.clone();
            let adapter = adapter.clone();

            producers.spawn(async move {
                for item in &input[range] {
                    tokio::task::yield_now().await;
                    adapter.put(item.clone());
                }
            });
        }

        let consumer = tokio::spawn(consume::<T, A>(
            adapter.clone(),
            producers_active.clone(),
            self.options.consumer_delay,
        ));

        let produced = join_producers(&mut producers).await;
        producers_active.store(false, Ordering::Release);

        if let Err(err) = produced {
            consumer.abort();
            // Cancelled or finished, either way it no longer touches the adapter.
            let _ = consumer.await;

            warn!("Run aborted: {}, {}", description, err);
            return Err(HarnessError::TaskFailed(err));
        }

        let output = consumer.await?;
        let elapsed = start.elapsed();

        let result = BenchmarkResult::new(
            description,
            elapsed,
            input.len(),
            adapter.remaining(),
            output.len(),
        );

        if result.pass {
            info!(
                "Finished run: {}, Elapsed: {:?}, Output: {}",
                description, elapsed, result.output_count
            );
        } else {
            warn!("Run failed: {:?}", result);
        }

        Ok((result, output))
    }

    /// Runs every registered adapter over the same input, fastest first. Ties list passing runs first.
    pub async fn run_all<T>(
        &self,
        input: Arc<[T]>,
        producer_count: usize,
    ) -> HarnessResult<Vec<BenchmarkResult>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut results = Vec::with_capacity(AdapterKind::ALL.len());

        for kind in AdapterKind::ALL {
            let adapter = kind.create::<T>(self.options.capacity_power)?;
            let result = self
                .run(kind.name(), producer_count, input.clone(), adapter)
                .await?;

            results.push(result);
        }

        sort_results(&mut results);

        Ok(results)
    }

    /// Blocking form of `run_all` on a dedicated worker pool sized from the options.
    pub fn run_all_blocking<T>(
        &self,
        input: Arc<[T]>,
        producer_count: usize,
    ) -> Result<Vec<BenchmarkResult>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let runtime = common::build_worker_pool(self.options.worker_threads)?;
        let results = runtime.block_on(self.run_all(input, producer_count))?;
        Ok(results)
    }
}

impl Default for BenchmarkHarness {
    fn default() -> Self {
        Self::new(HarnessOptions::default())
    }
}

/// Waits for every producer. On the first failure the rest are aborted and awaited, so none is
/// still putting once this returns.
async fn join_producers(producers: &mut JoinSet<()>) -> Result<(), JoinError> {
    while let Some(joined) = producers.join_next().await {
        if let Err(err) = joined {
            producers.abort_all();
            while producers.join_next().await.is_some() {}
            return Err(err);
        }
    }

    Ok(())
}

async fn consume<T, A>(
    adapter: Arc<A>,
    producers_active: Arc<AtomicBool>,
    delay: Duration,
) -> Vec<T>
where
    A: CollectionAdapter<T> + ?Sized,
{
    let mut output = Vec::new();

    while producers_active.load(Ordering::Acquire) || adapter.has_items() {
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        let before = output.len();
        adapter.drain_into(&mut output);

        if output.len() > before {
            debug!("Drained {} items", output.len() - before);
        }
    }

    output
}

fn validate(description: &str, producer_count: usize) -> HarnessResult<()> {
    if description.trim().is_empty() {
        return Err(HarnessError::Configuration(
            "description must not be empty".to_string(),
        ));
    }

    if producer_count == 0 {
        return Err(HarnessError::Configuration(
            "producer count must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// Splits `0..len` into `parts` contiguous ranges of `len / parts`. The remainder goes to the last range.
fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let size = len / parts;

    (0..parts)
        .map(|i| {
            let start = i * size;
            let end = if i + 1 == parts { len } else { start + size };
            start..end
        })
        .collect()
}

fn sort_results(results: &mut [BenchmarkResult]) {
    results.sort_by(|a, b| {
        a.elapsed
            .cmp(&b.elapsed)
            .then_with(|| b.pass.cmp(&a.pass))
    });
}
