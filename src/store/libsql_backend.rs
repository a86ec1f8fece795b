//! libSQL backend — embedded file or in-memory database behind `JobStore`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::job::model::{Job, JobStatus, Operation, TaskOutcome};
use crate::store::migrations;
use crate::store::traits::JobStore;

/// Columns selected for job rows, in `row_to_job` order.
const JOB_COLUMNS: &str =
    "id, number_a, number_b, status, progress, expected_count, created_at, updated_at";

/// Columns selected for outcome rows, in `row_to_outcome` order.
const OUTCOME_COLUMNS: &str = "id, job_id, operation, result, error, completed_at, created_at";

/// libSQL job store.
///
/// Holds a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Unavailable(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(store.conn()).await?;
        info!(path = %path.display(), "Job database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Unavailable(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Unavailable(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(store.conn()).await?;
        Ok(store)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn job_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM jobs WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("job_exists: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).unwrap_or(0);
                Ok(count > 0)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(StoreError::Query(format!("job_exists: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert a JobStatus to its DB string.
fn status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "PENDING",
        JobStatus::Processing => "PROCESSING",
        JobStatus::Completed => "COMPLETED",
        JobStatus::Failed => "FAILED",
    }
}

/// Parse a status string from the DB.
fn str_to_status(s: &str) -> JobStatus {
    match s {
        "PROCESSING" => JobStatus::Processing,
        "COMPLETED" => JobStatus::Completed,
        "FAILED" => JobStatus::Failed,
        _ => JobStatus::Pending,
    }
}

/// Parse an operation string from the DB.
fn str_to_operation(s: &str) -> Operation {
    s.parse().unwrap_or(Operation::Add)
}

/// Convert `Option<f64>` to a libsql Value.
fn opt_real(v: Option<f64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Real(v),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql row to a Job. Column order matches JOB_COLUMNS.
fn row_to_job(row: &libsql::Row) -> Result<Job, libsql::Error> {
    let id_str: String = row.get(0)?;
    let number_a: f64 = row.get(1)?;
    let number_b: f64 = row.get(2)?;
    let status_str: String = row.get(3)?;
    let progress: i64 = row.get(4)?;
    let expected_count: i64 = row.get(5)?;
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(Job {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        number_a,
        number_b,
        status: str_to_status(&status_str),
        progress: progress.clamp(0, 100) as u8,
        expected_count: expected_count.max(0) as u32,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql row to a TaskOutcome. Column order matches OUTCOME_COLUMNS.
fn row_to_outcome(row: &libsql::Row) -> Result<TaskOutcome, libsql::Error> {
    let id_str: String = row.get(0)?;
    let job_id_str: String = row.get(1)?;
    let operation_str: String = row.get(2)?;
    let result: Option<f64> = row.get(3).ok();
    let error: Option<String> = row.get(4).ok();
    let completed_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;

    Ok(TaskOutcome {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        job_id: Uuid::parse_str(&job_id_str).unwrap_or_else(|_| Uuid::nil()),
        operation: str_to_operation(&operation_str),
        result,
        error,
        completed_at: parse_datetime(&completed_str),
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl JobStore for LibSqlStore {
    async fn run_migrations(&self) -> Result<(), StoreError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO jobs (id, number_a, number_b, status, progress, expected_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    job.id.to_string(),
                    job.number_a,
                    job.number_b,
                    status_to_str(job.status),
                    job.progress as i64,
                    job.expected_count as i64,
                    job.created_at.to_rfc3339(),
                    job.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("create_job: {e}")))?;

        debug!(job_id = %job.id, "Job inserted");
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_job: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                row_to_job(&row).map_err(|e| StoreError::Query(format!("get_job row parse: {e}")))
            }
            Ok(None) => Err(StoreError::JobNotFound { id }),
            Err(e) => Err(StoreError::Query(format!("get_job: {e}"))),
        }
    }

    async fn fetch_status(&self, id: Uuid) -> Result<JobStatus, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT status FROM jobs WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("fetch_status: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let status_str: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("fetch_status: {e}")))?;
                Ok(str_to_status(&status_str))
            }
            Ok(None) => Err(StoreError::JobNotFound { id }),
            Err(e) => Err(StoreError::Query(format!("fetch_status: {e}"))),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: u8,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn()
            .execute(
                // MAX keeps progress monotonic; the status guard keeps
                // terminal jobs untouched.
                "UPDATE jobs SET status = ?1, progress = MAX(progress, ?2), updated_at = ?3
                 WHERE id = ?4 AND status NOT IN ('COMPLETED', 'FAILED')",
                params![status_to_str(status), progress as i64, now, id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_status: {e}")))?;

        if affected == 0 {
            // Either the job is terminal (a benign no-op) or it is missing.
            self.fetch_status(id).await?;
        }
        Ok(())
    }

    async fn finalize_job(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: u8,
    ) -> Result<bool, StoreError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn()
            .execute(
                "UPDATE jobs SET status = ?1, progress = MAX(progress, ?2), updated_at = ?3
                 WHERE id = ?4 AND status NOT IN ('COMPLETED', 'FAILED')",
                params![status_to_str(status), progress as i64, now, id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("finalize_job: {e}")))?;

        if affected == 0 {
            let current = self.fetch_status(id).await?;
            debug!(job_id = %id, status = %current, "Finalize lost to an earlier terminal write");
            return Ok(false);
        }

        debug!(job_id = %id, status = %status, "Job finalized");
        Ok(true)
    }

    async fn append_outcome(&self, outcome: &TaskOutcome) -> Result<bool, StoreError> {
        if !self.job_exists(outcome.job_id).await? {
            return Err(StoreError::JobNotFound {
                id: outcome.job_id,
            });
        }

        // OR IGNORE turns a duplicate (job_id, operation) into zero affected
        // rows instead of a constraint error.
        let affected = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO task_outcomes (id, job_id, operation, result, error, completed_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    outcome.id.to_string(),
                    outcome.job_id.to_string(),
                    outcome.operation.to_string(),
                    opt_real(outcome.result),
                    opt_text(outcome.error.as_deref()),
                    outcome.completed_at.to_rfc3339(),
                    outcome.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("append_outcome: {e}")))?;

        if affected == 0 {
            debug!(
                job_id = %outcome.job_id,
                operation = %outcome.operation,
                "Duplicate outcome ignored"
            );
            return Ok(false);
        }

        debug!(job_id = %outcome.job_id, operation = %outcome.operation, "Outcome recorded");
        Ok(true)
    }

    async fn list_outcomes(&self, job_id: Uuid) -> Result<Vec<TaskOutcome>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {OUTCOME_COLUMNS} FROM task_outcomes WHERE job_id = ?1
                     ORDER BY created_at, id"
                ),
                params![job_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_outcomes: {e}")))?;

        let mut outcomes = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let outcome = row_to_outcome(&row)
                .map_err(|e| StoreError::Query(format!("list_outcomes row parse: {e}")))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn count_outcomes(&self, job_id: Uuid) -> Result<u32, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM task_outcomes WHERE job_id = ?1",
                params![job_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("count_outcomes: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("count_outcomes: {e}")))?;
                Ok(count.max(0) as u32)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(StoreError::Query(format!("count_outcomes: {e}"))),
        }
    }
}
