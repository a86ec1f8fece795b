//! Executes a single sub-operation and records exactly one outcome.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::compute::{ComputeStrategy, arithmetic};
use crate::error::{Error, StrategyError};
use crate::job::Coordinator;
use crate::job::model::{Operation, TaskOutcome};

/// One dispatched sub-operation.
#[derive(Debug, Clone, Copy)]
pub struct TaskRequest {
    pub job_id: Uuid,
    pub operation: Operation,
    pub number_a: f64,
    pub number_b: f64,
    /// Consult the alternate strategy before the deterministic kernel.
    pub use_strategy: bool,
}

/// Executes one sub-operation and reports exactly one outcome for it.
pub struct TaskExecutor {
    coordinator: Arc<Coordinator>,
    strategy: Option<Arc<dyn ComputeStrategy>>,
    strategy_timeout: Duration,
}

impl TaskExecutor {
    pub fn new(
        coordinator: Arc<Coordinator>,
        strategy: Option<Arc<dyn ComputeStrategy>>,
        strategy_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            strategy,
            strategy_timeout,
        }
    }

    /// Run one sub-operation through to its recorded outcome.
    ///
    /// The alternate strategy is best-effort: any failure there falls back
    /// to the deterministic kernel and never becomes the task's failure
    /// cause. Exactly one outcome (value or error) is reported per call.
    pub async fn execute(&self, request: TaskRequest) -> Result<(), Error> {
        let TaskRequest {
            job_id,
            operation,
            number_a,
            number_b,
            use_strategy,
        } = request;

        self.coordinator.mark_processing(job_id).await?;

        let strategy_value = if use_strategy {
            self.try_strategy(operation, number_a, number_b).await
        } else {
            None
        };

        let outcome = match strategy_value {
            Some(value) => TaskOutcome::success(job_id, operation, value),
            None => match arithmetic(operation, number_a, number_b) {
                Ok(value) => TaskOutcome::success(job_id, operation, value),
                Err(e) => TaskOutcome::failure(job_id, operation, e.to_string()),
            },
        };

        self.coordinator.record_outcome(outcome).await?;
        Ok(())
    }

    /// Attempt the alternate strategy under the configured timeout.
    ///
    /// Returns `None` on any failure so the caller falls back to the
    /// deterministic kernel.
    async fn try_strategy(&self, operation: Operation, a: f64, b: f64) -> Option<f64> {
        let strategy = self.strategy.as_ref()?;

        let attempt = tokio::time::timeout(
            self.strategy_timeout,
            strategy.try_compute(operation, a, b),
        )
        .await
        .unwrap_or_else(|_| {
            Err(StrategyError::Timeout {
                name: strategy.name().to_string(),
                timeout: self.strategy_timeout,
            })
        });

        match attempt {
            Ok(value) => {
                debug!(
                    operation = %operation,
                    value,
                    strategy = strategy.name(),
                    "Strategy result used"
                );
                Some(value)
            }
            Err(e) => {
                warn!(
                    operation = %operation,
                    error = %e,
                    "Strategy computation failed, using deterministic fallback"
                );
                None
            }
        }
    }
}
