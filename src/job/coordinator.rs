//! Completion coordination — the job lifecycle state machine.
//!
//! Every task callback lands here: the outcome is appended to the ledger
//! (idempotently), progress is recomputed from the observed ledger size, and
//! once all expected outcomes are present exactly one caller performs the
//! terminal transition through the store's conditional update.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::job::model::{EXPECTED_TASK_COUNT, Job, JobStatus, TaskOutcome, progress_for};
use crate::store::JobStore;

/// Aggregates task outcomes into a single job status.
///
/// Holds the shared store handle; all methods are safe to call concurrently
/// for the same job from multiple tasks.
pub struct Coordinator {
    store: Arc<dyn JobStore>,
}

impl Coordinator {
    /// Create a coordinator over the given store.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Create a new job awaiting its full fan-out of outcomes.
    pub async fn create_job(&self, number_a: f64, number_b: f64) -> Result<Job, StoreError> {
        let job = Job::new(number_a, number_b, EXPECTED_TASK_COUNT);
        self.store.create_job(&job).await?;
        info!(job_id = %job.id, number_a, number_b, "Job created");
        Ok(job)
    }

    /// Move a job to PROCESSING at task start.
    ///
    /// Idempotent: a job already in PROCESSING stays there, and a terminal
    /// job is left untouched. Progress 0 keeps the current value (stores
    /// never let progress decrease).
    ///
    /// A failed start write forces the job to FAILED (best-effort) before
    /// the error is returned: the task that could not start will never
    /// report an outcome, so completion can no longer come from the ledger.
    pub async fn mark_processing(&self, job_id: Uuid) -> Result<(), StoreError> {
        if let Err(e) = self
            .store
            .update_status(job_id, JobStatus::Processing, 0)
            .await
        {
            error!(
                job_id = %job_id,
                error = %e,
                "Start-of-task write failed; forcing job to FAILED"
            );
            self.force_fail(job_id).await;
            return Err(e);
        }
        Ok(())
    }

    /// Record one task outcome and advance the job.
    ///
    /// Safe to call concurrently for the same job from multiple tasks. A
    /// duplicate `(job, operation)` outcome is a benign no-op that still
    /// refreshes progress. When the ledger reaches the expected count the
    /// job is finalized: FAILED if any outcome carries an error, COMPLETED
    /// otherwise, with exactly one caller winning the terminal write.
    ///
    /// A store failure during this bookkeeping forces the job to FAILED
    /// (best-effort) so it cannot stay stuck in PROCESSING; the original
    /// error is still returned to the caller.
    pub async fn record_outcome(&self, outcome: TaskOutcome) -> Result<(), StoreError> {
        let job_id = outcome.job_id;

        match self.advance(outcome).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(
                    job_id = %job_id,
                    error = %e,
                    "Outcome bookkeeping failed; forcing job to FAILED"
                );
                self.force_fail(job_id).await;
                Err(e)
            }
        }
    }

    /// Append the outcome, refresh progress, and finalize when complete.
    async fn advance(&self, outcome: TaskOutcome) -> Result<(), StoreError> {
        let job_id = outcome.job_id;
        let operation = outcome.operation;

        let recorded = self.store.append_outcome(&outcome).await?;
        if !recorded {
            debug!(job_id = %job_id, operation = %operation, "Duplicate outcome ignored");
        }

        let job = self.store.get_job(job_id).await?;
        let count = self.store.count_outcomes(job_id).await?;
        let progress = progress_for(count, job.expected_count);

        // Progress is written before the terminal check so polls observe it
        // even when this same callback finishes the job.
        self.store
            .update_status(job_id, JobStatus::Processing, progress)
            .await?;
        if recorded {
            info!(job_id = %job_id, operation = %operation, progress, "Outcome recorded");
        }

        if count >= job.expected_count {
            self.try_finalize(job_id).await?;
        }
        Ok(())
    }

    /// Decide and apply the terminal status for a fully-reported job.
    ///
    /// Concurrent callbacks may all reach this point; the store's
    /// conditional update guarantees a single winner.
    async fn try_finalize(&self, job_id: Uuid) -> Result<(), StoreError> {
        // Cheap short-circuit; correctness rests on the conditional write.
        if self.store.fetch_status(job_id).await?.is_terminal() {
            return Ok(());
        }

        let outcomes = self.store.list_outcomes(job_id).await?;
        let has_errors = outcomes.iter().any(|o| o.is_error());
        let status = if has_errors {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };

        if self.store.finalize_job(job_id, status, 100).await? {
            info!(job_id = %job_id, status = %status, "Job finalized");
        } else {
            debug!(job_id = %job_id, "Job already finalized by a concurrent task");
        }
        Ok(())
    }

    /// Best-effort conditional FAILED write for a job whose bookkeeping broke.
    async fn force_fail(&self, job_id: Uuid) {
        if let Err(force_err) = self.store.finalize_job(job_id, JobStatus::Failed, 0).await {
            warn!(job_id = %job_id, error = %force_err, "Could not force-fail job");
        }
    }
}
