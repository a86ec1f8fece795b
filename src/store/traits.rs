//! The storage contract every backend implements.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::job::model::{Job, JobStatus, TaskOutcome};

/// Backend-agnostic persistence boundary for jobs and their task outcomes.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError>;

    // ── Jobs ────────────────────────────────────────────────────────

    /// Insert a new job. The job is visible to concurrent readers as soon
    /// as this returns.
    async fn create_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Get a job by ID.
    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError>;

    /// Read just the current status of a job.
    async fn fetch_status(&self, id: Uuid) -> Result<JobStatus, StoreError>;

    /// Set status and progress. Progress never decreases; writes against a
    /// job that is already terminal are silent no-ops.
    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: u8,
    ) -> Result<(), StoreError>;

    /// Conditionally apply a terminal status in one atomic step.
    ///
    /// Succeeds only if the job is not yet terminal. Returns `true` if this
    /// caller performed the transition, `false` if another writer already
    /// finalized the job.
    async fn finalize_job(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: u8,
    ) -> Result<bool, StoreError>;

    // ── Outcomes ────────────────────────────────────────────────────

    /// Append a task outcome. At most one outcome is kept per
    /// `(job_id, operation)`; a duplicate append returns `false` and leaves
    /// the existing row untouched.
    async fn append_outcome(&self, outcome: &TaskOutcome) -> Result<bool, StoreError>;

    /// List all outcomes recorded for a job, oldest first.
    async fn list_outcomes(&self, job_id: Uuid) -> Result<Vec<TaskOutcome>, StoreError>;

    /// Count outcomes recorded for a job.
    async fn count_outcomes(&self, job_id: Uuid) -> Result<u32, StoreError>;
}
