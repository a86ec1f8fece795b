//! Error types for quadop.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job {id} not found")]
    JobNotFound { id: Uuid },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Arithmetic domain errors.
///
/// These are recorded as the failing task's outcome and never abort the job
/// as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

/// Alternate-strategy errors.
///
/// Absorbed by the executor's deterministic fallback; they never surface as
/// a task failure on their own.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("Strategy {name} request failed: {reason}")]
    RequestFailed { name: String, reason: String },

    #[error("Invalid response from {name}: {reason}")]
    InvalidResponse { name: String, reason: String },

    #[error("Strategy {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
