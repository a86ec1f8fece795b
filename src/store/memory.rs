//! In-memory reference backend, also the test default.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::job::model::{Job, JobStatus, TaskOutcome};
use crate::store::traits::JobStore;

/// In-memory job store.
///
/// Jobs and outcomes live behind a single lock so conditional writes stay
/// atomic with respect to each other.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, Job>,
    outcomes: HashMap<Uuid, Vec<TaskOutcome>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn run_migrations(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(format!("job {} already exists", job.id)));
        }
        inner.jobs.insert(job.id, job.clone());
        inner.outcomes.insert(job.id, Vec::new());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .get(&id)
            .cloned()
            .ok_or(StoreError::JobNotFound { id })
    }

    async fn fetch_status(&self, id: Uuid) -> Result<JobStatus, StoreError> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .get(&id)
            .map(|job| job.status)
            .ok_or(StoreError::JobNotFound { id })
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: u8,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or(StoreError::JobNotFound { id })?;

        if job.status.is_terminal() {
            debug!(job_id = %id, status = %job.status, "Ignoring status write to terminal job");
            return Ok(());
        }

        job.status = status;
        // Progress never decreases
        job.progress = job.progress.max(progress);
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn finalize_job(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: u8,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or(StoreError::JobNotFound { id })?;

        // Check-and-set under the write lock: exactly one caller wins.
        if job.status.is_terminal() {
            return Ok(false);
        }

        job.status = status;
        job.progress = job.progress.max(progress);
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn append_outcome(&self, outcome: &TaskOutcome) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.jobs.contains_key(&outcome.job_id) {
            return Err(StoreError::JobNotFound { id: outcome.job_id });
        }

        let outcomes = inner.outcomes.entry(outcome.job_id).or_default();
        if outcomes.iter().any(|o| o.operation == outcome.operation) {
            return Ok(false);
        }

        outcomes.push(outcome.clone());
        Ok(true)
    }

    async fn list_outcomes(&self, job_id: Uuid) -> Result<Vec<TaskOutcome>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.outcomes.get(&job_id).cloned().unwrap_or_default())
    }

    async fn count_outcomes(&self, job_id: Uuid) -> Result<u32, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.outcomes.get(&job_id).map(|o| o.len()).unwrap_or(0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::job::model::{EXPECTED_TASK_COUNT, Operation};

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let store = MemoryStore::new();
        let job = Job::new(6.0, 3.0, EXPECTED_TASK_COUNT);
        store.create_job(&job).await.unwrap();

        let loaded = store.get_job(job.id).await.unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.number_a, 6.0);
        assert_eq!(loaded.status, JobStatus::Pending);
        assert_eq!(store.fetch_status(job.id).await.unwrap(), JobStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.get_job(id).await,
            Err(StoreError::JobNotFound { .. })
        ));
        assert!(matches!(
            store.fetch_status(id).await,
            Err(StoreError::JobNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = MemoryStore::new();
        let job = Job::new(1.0, 2.0, EXPECTED_TASK_COUNT);
        store.create_job(&job).await.unwrap();
        assert!(matches!(
            store.create_job(&job).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_outcome_is_ignored() {
        let store = MemoryStore::new();
        let job = Job::new(6.0, 3.0, EXPECTED_TASK_COUNT);
        store.create_job(&job).await.unwrap();

        let first = TaskOutcome::success(job.id, Operation::Add, 9.0);
        assert!(store.append_outcome(&first).await.unwrap());

        let dup = TaskOutcome::success(job.id, Operation::Add, 999.0);
        assert!(!store.append_outcome(&dup).await.unwrap());

        let outcomes = store.list_outcomes(job.id).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].result, Some(9.0));
        assert_eq!(store.count_outcomes(job.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn outcome_for_unknown_job_is_rejected() {
        let store = MemoryStore::new();
        let outcome = TaskOutcome::success(Uuid::new_v4(), Operation::Add, 1.0);
        assert!(matches!(
            store.append_outcome(&outcome).await,
            Err(StoreError::JobNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn finalize_has_exactly_one_winner() {
        let store = MemoryStore::new();
        let job = Job::new(6.0, 3.0, EXPECTED_TASK_COUNT);
        store.create_job(&job).await.unwrap();

        assert!(store
            .finalize_job(job.id, JobStatus::Completed, 100)
            .await
            .unwrap());
        assert!(!store
            .finalize_job(job.id, JobStatus::Failed, 100)
            .await
            .unwrap());

        let loaded = store.get_job(job.id).await.unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.progress, 100);
    }

    #[tokio::test]
    async fn concurrent_finalize_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let job = Job::new(6.0, 3.0, EXPECTED_TASK_COUNT);
        store.create_job(&job).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            let id = job.id;
            handles.push(tokio::spawn(async move {
                store.finalize_job(id, JobStatus::Completed, 100).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn terminal_status_never_regresses() {
        let store = MemoryStore::new();
        let job = Job::new(6.0, 3.0, EXPECTED_TASK_COUNT);
        store.create_job(&job).await.unwrap();

        store
            .finalize_job(job.id, JobStatus::Failed, 100)
            .await
            .unwrap();
        store
            .update_status(job.id, JobStatus::Processing, 50)
            .await
            .unwrap();

        let loaded = store.get_job(job.id).await.unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.progress, 100);
    }

    #[tokio::test]
    async fn progress_is_monotonic() {
        let store = MemoryStore::new();
        let job = Job::new(6.0, 3.0, EXPECTED_TASK_COUNT);
        store.create_job(&job).await.unwrap();

        store
            .update_status(job.id, JobStatus::Processing, 75)
            .await
            .unwrap();
        // A late write with a smaller value must not move progress backwards.
        store
            .update_status(job.id, JobStatus::Processing, 50)
            .await
            .unwrap();

        assert_eq!(store.get_job(job.id).await.unwrap().progress, 75);
    }
}
