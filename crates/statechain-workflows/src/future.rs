// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run handles.

use std::fmt;

use serde::de::DeserializeOwned;
use statechain_core::{
    CoreError, InstanceStatus, OrchestrationMetadata, TaskFailure, TaskHubClient,
};
use tokio_util::sync::CancellationToken;

use crate::error::WorkflowError;

/// Handle to one workflow run.
///
/// A read-only view of the instance's durable state: waiting never changes
/// it, so any number of callers may wait on clones of the same handle.
#[derive(Clone)]
pub struct WorkflowFuture {
    instance_id: String,
    client: TaskHubClient,
}

impl WorkflowFuture {
    pub(crate) fn new(instance_id: String, client: TaskHubClient) -> Self {
        Self {
            instance_id,
            client,
        }
    }

    /// Instance ID of the run.
    pub fn id(&self) -> &str {
        &self.instance_id
    }

    /// Current state of the run, without waiting.
    pub async fn status(&self) -> Result<OrchestrationMetadata, WorkflowError> {
        Ok(self
            .client
            .get_orchestration_metadata(&self.instance_id)
            .await?)
    }

    /// Wait for the run to finish and return its output as JSON text.
    ///
    /// A failed run returns [`WorkflowError::Failed`] with the recorded
    /// failure. Cancelling `cancel` returns [`WorkflowError::Cancelled`] and
    /// leaves the run going.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<String, WorkflowError> {
        let metadata = self
            .client
            .wait_for_orchestration_completion(&self.instance_id, cancel)
            .await
            .map_err(|e| match e {
                CoreError::Cancelled { instance_id } => WorkflowError::Cancelled { instance_id },
                other => WorkflowError::Core(other),
            })?;

        match metadata.status {
            InstanceStatus::Failed => {
                let failure = metadata.failure_details.unwrap_or_else(|| {
                    TaskFailure::new(
                        TaskFailure::ORCHESTRATION_ERROR,
                        "workflow failed without details",
                    )
                });
                Err(WorkflowError::Failed {
                    error_type: failure.error_type,
                    message: failure.message,
                })
            }
            _ => Ok(metadata.serialized_output.unwrap_or_default()),
        }
    }

    /// Wait for the run to finish and decode its output.
    pub async fn wait_for<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<T, WorkflowError> {
        let output = self.wait(cancel).await?;
        serde_json::from_str(&output).map_err(WorkflowError::Decode)
    }
}

impl fmt::Debug for WorkflowFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowFuture")
            .field("instance_id", &self.instance_id)
            .finish_non_exhaustive()
    }
}
