//! Computation — the deterministic arithmetic kernel and pluggable
//! alternate strategies.

pub mod executor;
pub mod groq;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use executor::{TaskExecutor, TaskRequest};
pub use groq::GroqStrategy;

use crate::config::ComputeConfig;
use crate::error::{ComputeError, StrategyError};
use crate::job::model::Operation;

/// Alternate way of producing a numeric answer for one operation.
///
/// Best-effort by contract: callers bound each attempt with a timeout and
/// fall back to [`arithmetic`] on any failure, so implementations never
/// decide a task's fate.
#[async_trait]
pub trait ComputeStrategy: Send + Sync {
    /// Short name for logs and error context.
    fn name(&self) -> &str;

    /// Attempt to produce the numeric answer for one operation.
    async fn try_compute(
        &self,
        operation: Operation,
        a: f64,
        b: f64,
    ) -> Result<f64, StrategyError>;
}

/// Deterministic arithmetic kernel. The authoritative fallback for every
/// operation kind.
pub fn arithmetic(operation: Operation, a: f64, b: f64) -> Result<f64, ComputeError> {
    match operation {
        Operation::Add => Ok(a + b),
        Operation::Subtract => Ok(a - b),
        Operation::Multiply => Ok(a * b),
        Operation::Divide => {
            if b == 0.0 {
                Err(ComputeError::DivisionByZero)
            } else {
                Ok(a / b)
            }
        }
    }
}

/// Create the configured alternate strategy, if any.
///
/// Returns `None` when no API key is configured; the executor then goes
/// straight to the deterministic kernel.
pub fn create_strategy(config: &ComputeConfig) -> Option<Arc<dyn ComputeStrategy>> {
    let api_key = config.groq_api_key.clone()?;
    info!(model = groq::GROQ_MODEL, "Groq strategy enabled");
    Some(Arc::new(GroqStrategy::new(api_key)))
}
