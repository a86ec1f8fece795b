//! Fans a job out into one concurrent executor task per operation.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::compute::{TaskExecutor, TaskRequest};
use crate::job::model::{Job, Operation};

/// Fans a job out into its sub-operation tasks.
///
/// Tasks run as independent tokio tasks with no ordering guarantee; a
/// semaphore caps how many execute simultaneously. A failing task never
/// aborts its siblings.
pub struct Dispatcher {
    executor: Arc<TaskExecutor>,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    /// Create a dispatcher capped at `max_concurrent` simultaneous tasks.
    pub fn new(executor: Arc<TaskExecutor>, max_concurrent: usize) -> Self {
        Self {
            executor,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Dispatch one task per operation kind for this job.
    ///
    /// Returns immediately. The handle resolves once every task has finished
    /// and exists so callers can await the full fan-out; dropping it detaches
    /// the tasks.
    pub fn dispatch(&self, job: &Job, use_strategy: bool) -> JoinHandle<()> {
        let handles: Vec<_> = Operation::ALL
            .into_iter()
            .map(|operation| {
                self.spawn_task(TaskRequest {
                    job_id: job.id,
                    operation,
                    number_a: job.number_a,
                    number_b: job.number_b,
                    use_strategy,
                })
            })
            .collect();

        let job_id = job.id;
        debug!(job_id = %job_id, tasks = handles.len(), "Fan-out dispatched");

        tokio::spawn(async move {
            for result in join_all(handles).await {
                if let Err(e) = result {
                    error!(job_id = %job_id, error = %e, "Task panicked");
                }
            }
            debug!(job_id = %job_id, "Fan-out complete");
        })
    }

    fn spawn_task(&self, request: TaskRequest) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            // Closed only at shutdown; nothing left to do in that case.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            if let Err(e) = executor.execute(request).await {
                error!(
                    job_id = %request.job_id,
                    operation = %request.operation,
                    error = %e,
                    "Task execution failed"
                );
            }
        })
    }
}
