use std::time::Duration;

use anyhow::Result;
use collections::{DEFAULT_CAPACITY_POWER, MAX_CAPACITY_POWER, MIN_CAPACITY_POWER};
use common::Config;
use serde::{Deserialize, Serialize};

use crate::HarnessError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HarnessOptions {
    /// How long the consumer waits before each drain.
    pub consumer_delay: Duration,
    /// Segment capacity of the growable list, as a power of two.
    pub capacity_power: u32,
    /// Worker pool size used by the blocking entry points. `None` defers to `HARNESS_THREADS`.
    pub worker_threads: Option<usize>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            consumer_delay: Duration::from_millis(1),
            capacity_power: DEFAULT_CAPACITY_POWER,
            worker_threads: None,
        }
    }
}

impl Config for HarnessOptions {
    fn load(config: &common::ConfigLoader) -> Result<Self> {
        let defaults = Self::default();

        let capacity_power = config
            .get("capacity_power")
            .and_then(|v| v.as_u64())
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(defaults.capacity_power);

        if !(MIN_CAPACITY_POWER..=MAX_CAPACITY_POWER).contains(&capacity_power) {
            return Err(HarnessError::Configuration(format!(
                "capacity_power must be within {}..={}, got {}",
                MIN_CAPACITY_POWER, MAX_CAPACITY_POWER, capacity_power
            ))
            .into());
        }

        Ok(Self {
            consumer_delay: config
                .get("consumer_delay_ms")
                .and_then(|v| v.as_u64())
                .map(Duration::from_millis)
                .unwrap_or(defaults.consumer_delay),
            capacity_power,
            worker_threads: config
                .get("worker_threads")
                .and_then(|v| v.as_usize())
                .or(defaults.worker_threads),
        })
    }
}
