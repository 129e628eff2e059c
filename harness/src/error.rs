use collections::CapacityError;
use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Configuration error: {0}")]
    Capacity(#[from] CapacityError),

    #[error("Harness task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl HarnessError {
    /// True for errors raised while validating a run, before any task was started.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            HarnessError::Configuration(_) | HarnessError::Capacity(_)
        )
    }
}
