// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker loop that claims pending instances and drives their orchestrators.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::backend::Backend;
use crate::client::HubSignals;
use crate::config::Config;
use crate::error::CoreError;
use crate::persistence::{EventRecord, InstanceRecord, Persistence, event_types};
use crate::task::{OrchestrationContext, TaskFailure, TaskRegistry, panic_message};

/// Handle to a running worker loop.
pub struct TaskHubWorker {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TaskHubWorker {
    /// Recover abandoned instances and start the worker loop.
    ///
    /// Instances left `running` by a previous worker are moved back to
    /// `pending` and replayed from their checkpoints. The loop stops when
    /// `cancel` fires or [`TaskHubWorker::shutdown`] is called.
    pub async fn start(
        backend: Arc<dyn Backend>,
        registry: Arc<TaskRegistry>,
        signals: Arc<HubSignals>,
        config: &Config,
        cancel: CancellationToken,
        span: Span,
    ) -> Result<Self, CoreError> {
        let persistence = backend.persistence().await?;

        let requeued = persistence.requeue_running_instances().await?;
        if requeued > 0 {
            info!(requeued, "Recovered abandoned orchestrations");
        }

        let worker_loop = WorkerLoop {
            persistence,
            registry,
            signals,
            poll_interval: config.worker_poll_interval,
            max_concurrent: config.max_concurrent_orchestrations.max(1),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(worker_loop.run().instrument(span));

        info!(
            max_concurrent = config.max_concurrent_orchestrations,
            "Task hub worker started"
        );
        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// In-flight orchestrations are abandoned in the `running` state and
    /// resumed by the next worker.
    pub async fn shutdown(&mut self) -> Result<(), CoreError> {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|e| CoreError::WorkerStopFailed {
            reason: e.to_string(),
        })?;
        info!("Task hub worker stopped");
        Ok(())
    }
}

impl Drop for TaskHubWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct WorkerLoop {
    persistence: Arc<dyn Persistence>,
    registry: Arc<TaskRegistry>,
    signals: Arc<HubSignals>,
    poll_interval: Duration,
    max_concurrent: usize,
    cancel: CancellationToken,
}

impl WorkerLoop {
    async fn run(self) {
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            while let Some(result) = in_flight.try_join_next() {
                log_join_result(result);
            }

            let capacity = self.max_concurrent.saturating_sub(in_flight.len());
            if capacity > 0 {
                let limit = i64::try_from(capacity).unwrap_or(i64::MAX);
                match self.persistence.claim_pending_instances(limit).await {
                    Ok(records) => {
                        for record in records {
                            let run = run_orchestration(
                                self.persistence.clone(),
                                self.registry.clone(),
                                self.signals.clone(),
                                record,
                            );
                            in_flight.spawn(run.in_current_span());
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to claim pending orchestrations"),
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.signals.work.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join_result(result);
                }
            }
        }

        let abandoned = in_flight.len();
        in_flight.shutdown().await;
        debug!(abandoned, "Worker loop exited");
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result
        && e.is_panic()
    {
        error!(error = %e, "Orchestration task panicked");
    }
}

async fn run_orchestration(
    persistence: Arc<dyn Persistence>,
    registry: Arc<TaskRegistry>,
    signals: Arc<HubSignals>,
    record: InstanceRecord,
) {
    let instance_id = record.instance_id.clone();
    let span = tracing::info_span!(
        "orchestration",
        instance_id = %instance_id,
        workflow = %record.workflow_name
    );

    async move {
        if let Err(e) = persistence
            .insert_event(&EventRecord::new(&instance_id, event_types::STARTED))
            .await
        {
            warn!(error = %e, "Failed to record start event");
        }

        let result = match registry.orchestrator(&record.workflow_name) {
            Some(orchestrator) => {
                let ctx = OrchestrationContext::new(
                    record.instance_id.clone(),
                    record.workflow_name.clone(),
                    record.input,
                    persistence.clone(),
                    registry.clone(),
                );
                match AssertUnwindSafe(orchestrator(ctx)).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(TaskFailure::panic(format!(
                        "orchestrator '{}' panicked: {}",
                        record.workflow_name,
                        panic_message(panic.as_ref())
                    ))),
                }
            }
            None => Err(TaskFailure::new(
                TaskFailure::ORCHESTRATOR_NOT_REGISTERED,
                format!("orchestrator '{}' is not registered", record.workflow_name),
            )),
        };

        if let Err(e) = finish(persistence.as_ref(), &instance_id, result).await {
            error!(error = %e, "Failed to record orchestration result");
        }
        signals.completions.notify_waiters();
    }
    .instrument(span)
    .await
}

/// Record the orchestration result. The terminal event is only written when
/// this call moved the instance out of `running`.
async fn finish(
    persistence: &dyn Persistence,
    instance_id: &str,
    result: Result<Vec<u8>, TaskFailure>,
) -> Result<bool, CoreError> {
    match result {
        Ok(output) => {
            if !persistence.complete_instance(instance_id, &output).await? {
                debug!("Instance is no longer running, completion discarded");
                return Ok(false);
            }
            persistence
                .insert_event(&EventRecord::new(instance_id, event_types::COMPLETED))
                .await?;
            info!("Orchestration completed");
        }
        Err(failure) => {
            if !persistence.fail_instance(instance_id, &failure).await? {
                debug!(error = %failure, "Instance is no longer running, failure discarded");
                return Ok(false);
            }
            persistence
                .insert_event(
                    &EventRecord::new(instance_id, event_types::FAILED)
                        .with_subtype(&failure.error_type)
                        .with_payload(failure.message.clone().into_bytes()),
                )
                .await?;
            warn!(error = %failure, "Orchestration failed");
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqlitePersistence;

    async fn event_types_of(persistence: &SqlitePersistence, instance_id: &str) -> Vec<String> {
        persistence
            .list_events(instance_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[tokio::test]
    async fn test_finish_records_terminal_event() {
        let persistence = SqlitePersistence::in_memory().await.unwrap();
        persistence.create_instance("inst-1", "flow", b"{}").await.unwrap();
        let claimed = persistence.claim_pending_instances(1).await.unwrap();
        assert_eq!(claimed.len(), 1);

        assert!(finish(&persistence, "inst-1", Ok(b"1".to_vec())).await.unwrap());
        assert!(event_types_of(&persistence, "inst-1")
            .await
            .contains(&event_types::COMPLETED.to_string()));
    }

    #[tokio::test]
    async fn test_finish_skips_instance_not_running() {
        let persistence = SqlitePersistence::in_memory().await.unwrap();
        persistence.create_instance("inst-1", "flow", b"{}").await.unwrap();

        // Still pending: nothing moves, no terminal event
        assert!(!finish(&persistence, "inst-1", Ok(b"1".to_vec())).await.unwrap());
        let failure = TaskFailure::step_failure("late");
        assert!(!finish(&persistence, "inst-1", Err(failure)).await.unwrap());

        let events = event_types_of(&persistence, "inst-1").await;
        assert!(!events.contains(&event_types::COMPLETED.to_string()));
        assert!(!events.contains(&event_types::FAILED.to_string()));
    }
}
