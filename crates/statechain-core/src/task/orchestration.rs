// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{ActivityContext, TaskFailure, TaskRegistry, panic_message};
use crate::persistence::{EventRecord, Persistence, RetryAttemptRecord, event_types};
use crate::retry::RetryPolicy;

/// Context handed to an orchestration function.
///
/// Every activity call is assigned a deterministic checkpoint id from its
/// position in the call sequence. When an instance is replayed, calls whose
/// checkpoint already exists return the stored output instead of running
/// the activity again, so orchestration functions must issue the same calls
/// in the same order on every run.
pub struct OrchestrationContext {
    instance_id: String,
    workflow_name: String,
    input: Vec<u8>,
    sequence: u32,
    persistence: Arc<dyn Persistence>,
    registry: Arc<TaskRegistry>,
}

impl OrchestrationContext {
    pub(crate) fn new(
        instance_id: String,
        workflow_name: String,
        input: Vec<u8>,
        persistence: Arc<dyn Persistence>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            instance_id,
            workflow_name,
            input,
            sequence: 0,
            persistence,
            registry,
        }
    }

    /// Instance being driven.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Orchestrator name the instance was scheduled under.
    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Serialized orchestration input.
    pub fn raw_input(&self) -> &[u8] {
        &self.input
    }

    /// Decode the orchestration input.
    pub fn get_input<T: DeserializeOwned>(&self) -> Result<T, TaskFailure> {
        serde_json::from_slice(&self.input).map_err(|e| {
            TaskFailure::decode_error(format!(
                "orchestration '{}' input: {}",
                self.workflow_name, e
            ))
        })
    }

    /// Invoke a registered activity and decode its output.
    ///
    /// Without a retry policy the activity runs at most once. With one,
    /// failed attempts are recorded and retried after the policy's backoff
    /// until it gives up, at which point the last failure is returned.
    pub async fn call_activity<I, O>(
        &mut self,
        name: &str,
        input: &I,
        retry: Option<&RetryPolicy>,
    ) -> Result<O, TaskFailure>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let input = serde_json::to_vec(input).map_err(|e| {
            TaskFailure::orchestration_error(format!("encoding input of '{}': {}", name, e))
        })?;
        let output = self.call_activity_raw(name, input, retry).await?;
        serde_json::from_slice(&output).map_err(|e| {
            TaskFailure::decode_error(format!("activity '{}' output: {}", name, e))
        })
    }

    /// Invoke a registered activity with serialized input.
    #[instrument(skip(self, name, input, retry), fields(instance_id = %self.instance_id, activity = %name))]
    pub async fn call_activity_raw(
        &mut self,
        name: &str,
        input: Vec<u8>,
        retry: Option<&RetryPolicy>,
    ) -> Result<Vec<u8>, TaskFailure> {
        self.sequence += 1;
        let checkpoint_id = format!("{}:{}", self.sequence, name);

        if let Some(existing) = self
            .persistence
            .load_checkpoint(&self.instance_id, &checkpoint_id)
            .await
            .map_err(TaskFailure::orchestration_error)?
        {
            debug!(checkpoint_id = %checkpoint_id, "Replaying activity from checkpoint");
            return Ok(existing.state);
        }

        let activity = self.registry.activity(name).ok_or_else(|| {
            TaskFailure::new(
                TaskFailure::ACTIVITY_NOT_REGISTERED,
                format!("activity '{}' is not registered", name),
            )
        })?;

        let mut attempt: u32 = 0;
        let mut resumed_elapsed = Duration::ZERO;
        let started = Instant::now();
        if let Some(prior) = self.prior_attempts(&checkpoint_id).await? {
            let now = Utc::now();
            resumed_elapsed = duration_between(prior.first_failed_at, now);

            let delay = retry.and_then(|policy| {
                policy.next_delay(prior.last_attempt, resumed_elapsed, &prior.failure)
            });
            let Some(delay) = delay else {
                info!(
                    attempt = prior.last_attempt,
                    error = %prior.failure,
                    "Activity had already failed permanently"
                );
                return Err(prior.failure);
            };

            let remaining = delay.saturating_sub(duration_between(prior.last_failed_at, now));
            debug!(
                attempt = prior.last_attempt,
                delay_ms = remaining.as_millis() as u64,
                "Resuming activity retries"
            );
            attempt = prior.last_attempt;
            tokio::time::sleep(remaining).await;
        }

        loop {
            attempt += 1;
            let ctx = ActivityContext::new(&self.instance_id, name, attempt, input.clone());

            let result = match AssertUnwindSafe(activity(ctx)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(TaskFailure::panic(format!(
                    "activity '{}' panicked on attempt {}: {}",
                    name,
                    attempt,
                    panic_message(panic.as_ref())
                ))),
            };

            match result {
                Ok(output) => {
                    self.record_success(&checkpoint_id, name, &output).await?;
                    debug!(attempt, "Activity completed");
                    return Ok(output);
                }
                Err(failure) => {
                    self.record_failure(&checkpoint_id, name, attempt, &failure)
                        .await?;

                    let delay = retry.and_then(|policy| {
                        policy.next_delay(attempt, resumed_elapsed + started.elapsed(), &failure)
                    });
                    match delay {
                        Some(delay) => {
                            warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %failure,
                                "Activity failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            info!(attempt, error = %failure, "Activity failed permanently");
                            return Err(failure);
                        }
                    }
                }
            }
        }
    }

    /// Failed attempts an earlier run of this instance recorded for
    /// `checkpoint_id`, so retries continue from where they stopped.
    async fn prior_attempts(
        &self,
        checkpoint_id: &str,
    ) -> Result<Option<PriorAttempts>, TaskFailure> {
        let attempts: Vec<RetryAttemptRecord> = self
            .persistence
            .list_retry_attempts(&self.instance_id)
            .await
            .map_err(TaskFailure::orchestration_error)?
            .into_iter()
            .filter(|a| a.checkpoint_id == checkpoint_id)
            .collect();

        let (Some(first), Some(last)) = (attempts.first(), attempts.last()) else {
            return Ok(None);
        };
        let last_attempt = attempts
            .iter()
            .map(|a| u32::try_from(a.attempt).unwrap_or(0))
            .max()
            .unwrap_or(0);

        Ok(Some(PriorAttempts {
            last_attempt,
            first_failed_at: first.created_at,
            last_failed_at: last.created_at,
            failure: recorded_failure(last),
        }))
    }

    async fn record_success(
        &self,
        checkpoint_id: &str,
        name: &str,
        output: &[u8],
    ) -> Result<(), TaskFailure> {
        self.persistence
            .save_checkpoint(&self.instance_id, checkpoint_id, output)
            .await
            .map_err(TaskFailure::orchestration_error)?;
        self.persistence
            .update_instance_checkpoint(&self.instance_id, checkpoint_id)
            .await
            .map_err(TaskFailure::orchestration_error)?;
        self.persistence
            .insert_event(
                &EventRecord::new(&self.instance_id, event_types::ACTIVITY_COMPLETED)
                    .with_checkpoint(checkpoint_id)
                    .with_subtype(name),
            )
            .await
            .map_err(TaskFailure::orchestration_error)
    }

    async fn record_failure(
        &self,
        checkpoint_id: &str,
        name: &str,
        attempt: u32,
        failure: &TaskFailure,
    ) -> Result<(), TaskFailure> {
        let attempt = i32::try_from(attempt).unwrap_or(i32::MAX);
        self.persistence
            .save_retry_attempt(
                &self.instance_id,
                checkpoint_id,
                attempt,
                Some(&failure.to_string()),
            )
            .await
            .map_err(TaskFailure::orchestration_error)?;

        let payload = serde_json::to_vec(failure).map_err(TaskFailure::orchestration_error)?;
        self.persistence
            .insert_event(
                &EventRecord::new(&self.instance_id, event_types::ACTIVITY_FAILED)
                    .with_checkpoint(checkpoint_id)
                    .with_subtype(name)
                    .with_payload(payload),
            )
            .await
            .map_err(TaskFailure::orchestration_error)
    }
}

struct PriorAttempts {
    last_attempt: u32,
    first_failed_at: DateTime<Utc>,
    last_failed_at: DateTime<Utc>,
    failure: TaskFailure,
}

fn duration_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}

/// Rebuild a failure from its stored `Type: message` text.
fn recorded_failure(record: &RetryAttemptRecord) -> TaskFailure {
    match record.error_message.as_deref() {
        Some(text) => match text.split_once(": ") {
            Some((error_type, message)) => TaskFailure::new(error_type, message),
            None => TaskFailure::step_failure(text),
        },
        None => TaskFailure::step_failure(format!("attempt {} failed", record.attempt)),
    }
}
