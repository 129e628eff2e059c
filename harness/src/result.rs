use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub description: String,
    pub elapsed: Duration,
    pub input_count: usize,
    pub remaining_count: usize,
    pub output_count: usize,
    pub pass: bool,
}

impl BenchmarkResult {
    pub fn new(
        description: impl Into<String>,
        elapsed: Duration,
        input_count: usize,
        remaining_count: usize,
        output_count: usize,
    ) -> Self {
        Self {
            description: description.into(),
            elapsed,
            input_count,
            remaining_count,
            output_count,
            pass: input_count == output_count && remaining_count == 0,
        }
    }
}
