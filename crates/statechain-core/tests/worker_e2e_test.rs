// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! E2E tests for the task hub worker.
//!
//! Orchestrators here add numbers through an `adder::add` activity so the
//! number of real activity executions can be counted across replays.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::FutureExt;
use statechain_core::persistence::event_types;
use statechain_core::{
    ActivityContext, ActivityFn, Backend, Config, HubSignals, InstanceStatus,
    OrchestrationContext, OrchestratorFn, RetryPolicy, SqliteBackend, TaskFailure, TaskHubClient,
    TaskHubWorker, TaskRegistry,
};
use tokio_util::sync::CancellationToken;

struct Harness {
    backend: Arc<SqliteBackend>,
    client: TaskHubClient,
    signals: Arc<HubSignals>,
    config: Config,
}

impl Harness {
    async fn start(config: Config) -> Self {
        let backend = Arc::new(SqliteBackend::from_config(&config));
        backend.start().await.expect("backend should start");
        let signals = Arc::new(HubSignals::default());
        let client = TaskHubClient::new(
            backend.clone(),
            signals.clone(),
            config.completion_poll_interval,
        );
        Self {
            backend,
            client,
            signals,
            config,
        }
    }

    async fn worker(&self, registry: TaskRegistry) -> TaskHubWorker {
        TaskHubWorker::start(
            self.backend.clone(),
            Arc::new(registry),
            self.signals.clone(),
            &self.config,
            CancellationToken::new(),
            tracing::Span::none(),
        )
        .await
        .expect("worker should start")
    }
}

fn fast_config() -> Config {
    Config::default()
        .with_worker_poll_interval(Duration::from_millis(10))
        .with_completion_poll_interval(Duration::from_millis(10))
}

/// `adder::add` takes `[a, b]` and returns `a + b`.
fn add_activity(calls: Arc<AtomicU32>) -> ActivityFn {
    Arc::new(move |ctx: ActivityContext| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let [a, b]: [i64; 2] = ctx.get_input()?;
            serde_json::to_vec(&(a + b)).map_err(|e| TaskFailure::decode_error(e.to_string()))
        }
        .boxed()
    })
}

/// `adder` sums its input list with one activity call per element.
fn adder_orchestrator() -> OrchestratorFn {
    Arc::new(|mut ctx: OrchestrationContext| {
        async move {
            let numbers: Vec<i64> = ctx.get_input()?;
            let mut total = 0i64;
            for n in numbers {
                total = ctx.call_activity("adder::add", &[total, n], None).await?;
            }
            serde_json::to_vec(&total).map_err(|e| TaskFailure::decode_error(e.to_string()))
        }
        .boxed()
    })
}

fn adder_registry(calls: Arc<AtomicU32>) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry
        .add_orchestrator("adder", adder_orchestrator())
        .unwrap();
    registry
        .add_activity("adder::add", add_activity(calls))
        .unwrap();
    registry
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_runs_orchestration_to_completion() {
    let harness = Harness::start(fast_config()).await;
    let calls = Arc::new(AtomicU32::new(0));
    let mut worker = harness.worker(adder_registry(calls.clone())).await;

    let id = harness
        .client
        .schedule_new_orchestration("adder", b"[1, 2, 3, 4]")
        .await
        .unwrap();

    let metadata = tokio::time::timeout(
        Duration::from_secs(10),
        harness
            .client
            .wait_for_orchestration_completion(&id, &CancellationToken::new()),
    )
    .await
    .expect("orchestration should finish")
    .unwrap();

    assert_eq!(metadata.status, InstanceStatus::Completed);
    assert_eq!(metadata.serialized_output.as_deref(), Some("10"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let events = harness
        .backend
        .persistence()
        .await
        .unwrap()
        .list_events(&id)
        .await
        .unwrap();
    let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types.first().copied(), Some(event_types::SCHEDULED));
    assert_eq!(types.last().copied(), Some(event_types::COMPLETED));
    assert_eq!(
        types
            .iter()
            .filter(|t| **t == event_types::ACTIVITY_COMPLETED)
            .count(),
        4
    );

    worker.shutdown().await.unwrap();
    assert!(!worker.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unregistered_orchestrator_fails_instance() {
    let harness = Harness::start(fast_config()).await;
    let mut worker = harness.worker(TaskRegistry::new()).await;

    let id = harness
        .client
        .schedule_new_orchestration("missing", b"null")
        .await
        .unwrap();

    let metadata = tokio::time::timeout(
        Duration::from_secs(10),
        harness
            .client
            .wait_for_orchestration_completion(&id, &CancellationToken::new()),
    )
    .await
    .expect("orchestration should finish")
    .unwrap();

    assert_eq!(metadata.status, InstanceStatus::Failed);
    let failure = metadata.failure_details.unwrap();
    assert_eq!(failure.error_type, TaskFailure::ORCHESTRATOR_NOT_REGISTERED);

    worker.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_activity_retry_failure_fails_instance() {
    let harness = Harness::start(fast_config()).await;
    let attempts = Arc::new(AtomicU32::new(0));

    let failing: ActivityFn = {
        let attempts = attempts.clone();
        Arc::new(move |_ctx: ActivityContext| {
            let attempts = attempts.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                Err(TaskFailure::step_failure(format!("attempt {} failed", n)))
            }
            .boxed()
        })
    };
    let orchestrator: OrchestratorFn = Arc::new(|mut ctx: OrchestrationContext| {
        async move {
            let policy = RetryPolicy::new(3, Duration::from_millis(5));
            let out: i64 = ctx
                .call_activity("flaky::run", &0i64, Some(&policy))
                .await?;
            serde_json::to_vec(&out).map_err(|e| TaskFailure::decode_error(e.to_string()))
        }
        .boxed()
    });

    let mut registry = TaskRegistry::new();
    registry.add_orchestrator("flaky", orchestrator).unwrap();
    registry.add_activity("flaky::run", failing).unwrap();
    let mut worker = harness.worker(registry).await;

    let id = harness
        .client
        .schedule_new_orchestration("flaky", b"null")
        .await
        .unwrap();
    let metadata = tokio::time::timeout(
        Duration::from_secs(10),
        harness
            .client
            .wait_for_orchestration_completion(&id, &CancellationToken::new()),
    )
    .await
    .expect("orchestration should finish")
    .unwrap();

    assert_eq!(metadata.status, InstanceStatus::Failed);
    assert_eq!(
        metadata.failure_details,
        Some(TaskFailure::step_failure("attempt 3 failed"))
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    let recorded = harness
        .backend
        .persistence()
        .await
        .unwrap()
        .list_retry_attempts(&id)
        .await
        .unwrap();
    assert_eq!(recorded.len(), 3);

    worker.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recovered_instance_replays_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config().with_database_path(dir.path().join("state.db"));
    let harness = Harness::start(config).await;

    let id = harness
        .client
        .schedule_new_orchestration("adder", b"[5, 7]")
        .await
        .unwrap();

    // Simulate a worker that claimed the instance, completed the first
    // activity call and then died.
    let persistence = harness.backend.persistence().await.unwrap();
    let claimed = persistence.claim_pending_instances(1).await.unwrap();
    assert_eq!(claimed.len(), 1);
    persistence
        .save_checkpoint(&id, "1:adder::add", b"5")
        .await
        .unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let mut worker = harness.worker(adder_registry(calls.clone())).await;

    let metadata = tokio::time::timeout(
        Duration::from_secs(10),
        harness
            .client
            .wait_for_orchestration_completion(&id, &CancellationToken::new()),
    )
    .await
    .expect("orchestration should finish")
    .unwrap();

    assert_eq!(metadata.status, InstanceStatus::Completed);
    assert_eq!(metadata.serialized_output.as_deref(), Some("12"));
    // Only the second call ran; the first came from its checkpoint
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    worker.shutdown().await.unwrap();
    harness.backend.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_abandons_in_flight_instance() {
    let harness = Harness::start(fast_config()).await;
    let started = Arc::new(tokio::sync::Notify::new());

    let slow: ActivityFn = {
        let started = started.clone();
        Arc::new(move |_ctx: ActivityContext| {
            let started = started.clone();
            async move {
                started.notify_one();
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(b"null".to_vec())
            }
            .boxed()
        })
    };
    let orchestrator: OrchestratorFn = Arc::new(|mut ctx: OrchestrationContext| {
        async move {
            ctx.call_activity_raw("slow::wait", b"null".to_vec(), None)
                .await
        }
        .boxed()
    });

    let mut registry = TaskRegistry::new();
    registry.add_orchestrator("slow", orchestrator).unwrap();
    registry.add_activity("slow::wait", slow).unwrap();
    let mut worker = harness.worker(registry).await;

    let id = harness
        .client
        .schedule_new_orchestration("slow", b"null")
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(10), started.notified())
        .await
        .expect("activity should start");

    worker.shutdown().await.unwrap();

    let metadata = harness.client.get_orchestration_metadata(&id).await.unwrap();
    assert_eq!(metadata.status, InstanceStatus::Running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_requires_started_backend() {
    let config = fast_config();
    let backend = Arc::new(SqliteBackend::from_config(&config));

    let result = TaskHubWorker::start(
        backend,
        Arc::new(TaskRegistry::new()),
        Arc::new(HubSignals::default()),
        &config,
        CancellationToken::new(),
        tracing::Span::none(),
    )
    .await;

    let err = result.err().expect("worker start should fail");
    assert_eq!(err.error_code(), "BACKEND_NOT_STARTED");
}
