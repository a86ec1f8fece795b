//! Integration tests for the job REST API.
//!
//! Each test spins up an Axum server on a random port, drives it with a
//! reqwest client, and exercises the real create → poll-to-terminal contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use async_trait::async_trait;

use quadop::api::{AppState, api_routes};
use quadop::compute::{ComputeStrategy, TaskExecutor};
use quadop::error::StrategyError;
use quadop::job::model::Operation;
use quadop::job::{Coordinator, Dispatcher};
use quadop::store::{JobStore, MemoryStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Strategy stub returning a fixed value (no real API calls).
struct FixedStrategy(f64);

#[async_trait]
impl ComputeStrategy for FixedStrategy {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn try_compute(
        &self,
        _operation: Operation,
        _a: f64,
        _b: f64,
    ) -> Result<f64, StrategyError> {
        Ok(self.0)
    }
}

/// Strategy stub that never answers within any sane timeout.
struct StalledStrategy;

#[async_trait]
impl ComputeStrategy for StalledStrategy {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn try_compute(
        &self,
        _operation: Operation,
        _a: f64,
        _b: f64,
    ) -> Result<f64, StrategyError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(0.0)
    }
}

/// Start an Axum server on a random port with the default deterministic
/// setup, return the port.
async fn start_server() -> u16 {
    start_server_with_strategy(None, Duration::from_secs(1)).await
}

async fn start_server_with_strategy(
    strategy: Option<Arc<dyn ComputeStrategy>>,
    strategy_timeout: Duration,
) -> u16 {
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    let coordinator = Arc::new(Coordinator::new(store));
    let executor = Arc::new(TaskExecutor::new(
        Arc::clone(&coordinator),
        strategy,
        strategy_timeout,
    ));
    let dispatcher = Arc::new(Dispatcher::new(executor, 4));
    let app = api_routes(AppState {
        coordinator,
        dispatcher,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    port
}

/// Create a job and return the response status plus the parsed body.
async fn post_job(client: &reqwest::Client, port: u16, body: Value) -> (u16, Value) {
    let resp = client
        .post(format!("http://127.0.0.1:{port}/api/jobs"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body: Value = resp.json().await.unwrap();
    (status, body)
}

/// Poll a job until it reaches a terminal status, returning the final body.
async fn poll_until_terminal(client: &reqwest::Client, port: u16, job_id: &str) -> Value {
    loop {
        let body: Value = client
            .get(format!("http://127.0.0.1:{port}/api/jobs/{job_id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        match body["status"].as_str().unwrap() {
            "COMPLETED" | "FAILED" => return body,
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
}

/// Look up the numeric result recorded for one operation.
fn result_for(results: &[Value], operation: &str) -> Option<f64> {
    results
        .iter()
        .find(|r| r["operation"] == operation)
        .and_then(|r| r["result"].as_f64())
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server().await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "quadop");
    })
    .await
    .expect("test timed out");
}

// ── Create → poll scenarios ──────────────────────────────────────────

#[tokio::test]
async fn job_completes_with_all_four_results() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server().await;
        let client = reqwest::Client::new();

        let (status, body) = post_job(&client, port, json!({"numberA": 6, "numberB": 3})).await;
        assert_eq!(status, 201);
        let job_id = body["jobId"].as_str().unwrap().to_string();
        uuid::Uuid::parse_str(&job_id).expect("jobId is not a UUID");

        let job = poll_until_terminal(&client, port, &job_id).await;
        assert_eq!(job["status"], "COMPLETED");
        assert_eq!(job["progress"], 100);
        assert_eq!(job["numberA"], 6.0);
        assert_eq!(job["numberB"], 3.0);

        let results = job["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(result_for(results, "add"), Some(9.0));
        assert_eq!(result_for(results, "subtract"), Some(3.0));
        assert_eq!(result_for(results, "multiply"), Some(18.0));
        assert_eq!(result_for(results, "divide"), Some(2.0));
        assert!(results.iter().all(|r| r["error"].is_null()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn division_by_zero_fails_job_but_keeps_partial_results() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server().await;
        let client = reqwest::Client::new();

        let (status, body) = post_job(&client, port, json!({"numberA": 10, "numberB": 0})).await;
        assert_eq!(status, 201);
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let job = poll_until_terminal(&client, port, &job_id).await;
        assert_eq!(job["status"], "FAILED");
        assert_eq!(job["progress"], 100);

        let results = job["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(result_for(results, "add"), Some(10.0));
        assert_eq!(result_for(results, "subtract"), Some(10.0));
        assert_eq!(result_for(results, "multiply"), Some(0.0));

        let divide = results.iter().find(|r| r["operation"] == "divide").unwrap();
        assert!(divide["result"].is_null());
        assert_eq!(divide["error"], "Division by zero");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn job_body_carries_operands_and_timestamps() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server().await;
        let client = reqwest::Client::new();

        let (_, body) = post_job(&client, port, json!({"numberA": 1.5, "numberB": -2})).await;
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let job = poll_until_terminal(&client, port, &job_id).await;
        assert_eq!(job["id"], job_id);
        assert_eq!(job["numberA"], 1.5);
        assert_eq!(job["numberB"], -2.0);
        assert_eq!(job["expectedCount"], 4);
        assert!(job["createdAt"].is_string());
        assert!(job["updatedAt"].is_string());
    })
    .await
    .expect("test timed out");
}

// ── Progress and stability ───────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotonic_and_results_never_change() {
    timeout(TEST_TIMEOUT, async {
        // A stalled strategy with a short timeout stretches each task just
        // enough to observe intermediate polls.
        let port =
            start_server_with_strategy(Some(Arc::new(StalledStrategy)), Duration::from_millis(50))
                .await;
        let client = reqwest::Client::new();

        let (_, body) = post_job(
            &client,
            port,
            json!({"numberA": 6, "numberB": 3, "useLLM": true}),
        )
        .await;
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let mut last_progress = 0;
        let mut seen: HashMap<String, Value> = HashMap::new();
        loop {
            let job: Value = client
                .get(format!("http://127.0.0.1:{port}/api/jobs/{job_id}"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();

            let progress = job["progress"].as_u64().unwrap();
            assert!(
                progress >= last_progress,
                "progress went backwards: {last_progress} -> {progress}"
            );
            last_progress = progress;

            // Once recorded, an outcome's value must never change.
            for result in job["results"].as_array().unwrap() {
                let operation = result["operation"].as_str().unwrap().to_string();
                match seen.get(&operation) {
                    Some(previous) => assert_eq!(previous, result),
                    None => {
                        seen.insert(operation, result.clone());
                    }
                }
            }

            match job["status"].as_str().unwrap() {
                "COMPLETED" | "FAILED" => break,
                _ => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }

        assert_eq!(last_progress, 100);
        assert_eq!(seen.len(), 4);
    })
    .await
    .expect("test timed out");
}

// ── Alternate strategy over the full stack ───────────────────────────

#[tokio::test]
async fn strategy_results_win_when_requested() {
    timeout(TEST_TIMEOUT, async {
        let port =
            start_server_with_strategy(Some(Arc::new(FixedStrategy(7.0))), Duration::from_secs(1))
                .await;
        let client = reqwest::Client::new();

        let (_, body) = post_job(
            &client,
            port,
            json!({"numberA": 6, "numberB": 3, "useLLM": true}),
        )
        .await;
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let job = poll_until_terminal(&client, port, &job_id).await;
        assert_eq!(job["status"], "COMPLETED");

        let results = job["results"].as_array().unwrap();
        for operation in ["add", "subtract", "multiply", "divide"] {
            assert_eq!(result_for(results, operation), Some(7.0));
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn strategy_is_ignored_without_the_flag() {
    timeout(TEST_TIMEOUT, async {
        let port =
            start_server_with_strategy(Some(Arc::new(FixedStrategy(7.0))), Duration::from_secs(1))
                .await;
        let client = reqwest::Client::new();

        let (_, body) = post_job(&client, port, json!({"numberA": 6, "numberB": 3})).await;
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let job = poll_until_terminal(&client, port, &job_id).await;
        let results = job["results"].as_array().unwrap();
        assert_eq!(result_for(results, "add"), Some(9.0));
        assert_eq!(result_for(results, "divide"), Some(2.0));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn stalled_strategy_falls_back_to_deterministic_results() {
    timeout(TEST_TIMEOUT, async {
        let port =
            start_server_with_strategy(Some(Arc::new(StalledStrategy)), Duration::from_millis(50))
                .await;
        let client = reqwest::Client::new();

        let (_, body) = post_job(
            &client,
            port,
            json!({"numberA": 8, "numberB": 2, "useLLM": true}),
        )
        .await;
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let job = poll_until_terminal(&client, port, &job_id).await;
        assert_eq!(job["status"], "COMPLETED");

        let results = job["results"].as_array().unwrap();
        assert_eq!(result_for(results, "add"), Some(10.0));
        assert_eq!(result_for(results, "subtract"), Some(6.0));
        assert_eq!(result_for(results, "multiply"), Some(16.0));
        assert_eq!(result_for(results, "divide"), Some(4.0));
    })
    .await
    .expect("test timed out");
}

// ── Error paths ──────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_job_returns_404() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server().await;

        let fake_id = uuid::Uuid::new_v4();
        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/jobs/{fake_id}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Job not found");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_job_id_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server().await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/jobs/not-a-uuid"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Invalid job ID");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn non_numeric_operand_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server().await;
        let client = reqwest::Client::new();

        let (status, body) =
            post_job(&client, port, json!({"numberA": "six", "numberB": 3})).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("Invalid input"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_operand_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server().await;
        let client = reqwest::Client::new();

        let (status, _body) = post_job(&client, port, json!({"numberA": 6})).await;
        assert_eq!(status, 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unparseable_body_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server().await;

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/jobs"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}
