//! Job and task-outcome domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ComputeError;

/// Number of sub-operations every job fans out into.
pub const EXPECTED_TASK_COUNT: u32 = Operation::ALL.len() as u32;

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job is created but no task has reported yet.
    Pending,
    /// At least one task has started working.
    Processing,
    /// All tasks reported and none failed.
    Completed,
    /// At least one task failed, or the job could not be processed.
    Failed,
}

impl JobStatus {
    /// Check if this status allows transitioning to another status.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            // From Pending
            (Pending, Processing) | (Pending, Failed) |
            // From Processing
            (Processing, Completed) | (Processing, Failed)
        )
    }

    /// Check if this is a terminal status. Terminal jobs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// One of the four arithmetic sub-operations a job fans out into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    /// All operations, in dispatch order.
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    /// Arithmetic symbol used in strategy prompts.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "×",
            Self::Divide => "÷",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Operation {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            "multiply" => Ok(Self::Multiply),
            "divide" => Ok(Self::Divide),
            other => Err(ComputeError::UnknownOperation(other.to_string())),
        }
    }
}

/// A submitted computation job: the parent aggregate for its sub-operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID, assigned at creation.
    pub id: Uuid,
    /// First operand. Immutable after creation.
    pub number_a: f64,
    /// Second operand. Immutable after creation.
    pub number_b: f64,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// 0-100, derived from recorded outcomes. Never decreases.
    pub progress: u8,
    /// Number of outcomes required to reach a terminal status.
    pub expected_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in the initial state.
    pub fn new(number_a: f64, number_b: f64, expected_count: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            number_a,
            number_b,
            status: JobStatus::Pending,
            progress: 0,
            expected_count,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Recorded result of exactly one sub-operation.
///
/// Exactly one of `result` / `error` is set; construct through
/// [`TaskOutcome::success`] or [`TaskOutcome::failure`] to keep that
/// invariant. Outcomes are immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub id: Uuid,
    pub job_id: Uuid,
    pub operation: Operation,
    pub result: Option<f64>,
    pub error: Option<String>,
    /// When the task finished computing.
    pub completed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TaskOutcome {
    /// Record a successful computation.
    pub fn success(job_id: Uuid, operation: Operation, result: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id,
            operation,
            result: Some(result),
            error: None,
            completed_at: now,
            created_at: now,
        }
    }

    /// Record a failed computation.
    pub fn failure(job_id: Uuid, operation: Operation, error: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id,
            operation,
            result: None,
            error: Some(error.into()),
            completed_at: now,
            created_at: now,
        }
    }

    /// True when this outcome recorded a failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Progress percentage for `completed` of `expected` outcomes.
///
/// Rounded to the nearest whole percent and capped at 100. With the
/// canonical four-operation fan-out this advances 25 points per outcome.
pub fn progress_for(completed: u32, expected: u32) -> u8 {
    if expected == 0 {
        return 100;
    }
    let pct = (completed as f64 * 100.0 / expected as f64).round() as u32;
    pct.min(100) as u8
}
