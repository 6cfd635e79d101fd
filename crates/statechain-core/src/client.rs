// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client side of the task hub: schedule orchestrations and observe them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::CoreError;
use crate::persistence::{EventRecord, InstanceRecord, InstanceStatus, event_types};
use crate::task::TaskFailure;

/// In-process wake-ups shared by a client and the worker it feeds.
///
/// Storage remains the source of truth; the notifications only shorten
/// polling.
#[derive(Debug, Default)]
pub struct HubSignals {
    /// Signalled when a new instance is scheduled.
    pub work: Notify,
    /// Signalled when any instance reaches a terminal state.
    pub completions: Notify,
}

/// Point-in-time view of an orchestration instance.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationMetadata {
    /// Instance ID.
    pub instance_id: String,
    /// Orchestrator name.
    pub name: String,
    /// Current status.
    pub status: InstanceStatus,
    /// Serialized output, set once completed.
    pub serialized_output: Option<String>,
    /// Failure details, set once failed.
    pub failure_details: Option<TaskFailure>,
    /// When the instance was scheduled.
    pub created_at: DateTime<Utc>,
    /// When the instance finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl OrchestrationMetadata {
    fn from_record(record: InstanceRecord) -> Result<Self, CoreError> {
        let status = record.status().ok_or_else(|| CoreError::DatabaseError {
            operation: "get_instance".to_string(),
            details: format!(
                "instance '{}' has unknown status '{}'",
                record.instance_id, record.status
            ),
        })?;
        let failure_details = match status {
            InstanceStatus::Failed => record.failure(),
            _ => None,
        };

        Ok(Self {
            serialized_output: record
                .output
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
            failure_details,
            status,
            instance_id: record.instance_id,
            name: record.workflow_name,
            created_at: record.created_at,
            finished_at: record.finished_at,
        })
    }

    /// Whether the instance has finished.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Schedules orchestration instances and reads their state.
#[derive(Clone)]
pub struct TaskHubClient {
    backend: Arc<dyn Backend>,
    signals: Arc<HubSignals>,
    poll_interval: Duration,
}

impl TaskHubClient {
    /// Create a client bound to `backend`.
    pub fn new(backend: Arc<dyn Backend>, signals: Arc<HubSignals>, poll_interval: Duration) -> Self {
        Self {
            backend,
            signals,
            poll_interval,
        }
    }

    /// Schedule a new instance of orchestrator `name`. Returns its instance ID.
    #[instrument(skip(self, input), fields(input_size = input.len()))]
    pub async fn schedule_new_orchestration(
        &self,
        name: &str,
        input: &[u8],
    ) -> Result<String, CoreError> {
        if name.is_empty() {
            return Err(CoreError::ValidationError {
                field: "name".to_string(),
                message: "orchestrator name must not be empty".to_string(),
            });
        }

        let persistence = self.backend.persistence().await?;
        let instance_id = Uuid::new_v4().to_string();

        persistence.create_instance(&instance_id, name, input).await?;
        persistence
            .insert_event(&EventRecord::new(&instance_id, event_types::SCHEDULED).with_subtype(name))
            .await?;
        self.signals.work.notify_one();

        info!(instance_id = %instance_id, "Orchestration scheduled");
        Ok(instance_id)
    }

    /// Read the current state of an instance.
    pub async fn get_orchestration_metadata(
        &self,
        instance_id: &str,
    ) -> Result<OrchestrationMetadata, CoreError> {
        let persistence = self.backend.persistence().await?;
        let record = persistence
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| CoreError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })?;

        OrchestrationMetadata::from_record(record)
    }

    /// Wait until an instance is completed or failed.
    ///
    /// Returns [`CoreError::Cancelled`] when `cancel` fires first; the
    /// instance itself keeps running.
    #[instrument(skip(self, cancel))]
    pub async fn wait_for_orchestration_completion(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<OrchestrationMetadata, CoreError> {
        loop {
            // Register interest before reading so a completion between the
            // read and the select is not missed.
            let notified = self.signals.completions.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let metadata = self.get_orchestration_metadata(instance_id).await?;
            if metadata.is_terminal() {
                debug!(status = %metadata.status, "Orchestration finished");
                return Ok(metadata);
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(CoreError::Cancelled {
                        instance_id: instance_id.to_string(),
                    });
                }
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
