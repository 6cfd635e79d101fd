// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow runtime error types.

use statechain_core::CoreError;
use statechain_dsl::MachineError;
use thiserror::Error;

/// Errors returned by the workflow runtime.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No workflow with this name was registered.
    #[error("unknown workflow '{0}'")]
    UnknownWorkflow(String),

    /// The input is not the workflow's payload type.
    #[error("workflow '{workflow}' expects input of type {expected}")]
    InputTypeMismatch {
        /// Workflow name.
        workflow: String,
        /// Payload type name.
        expected: &'static str,
    },

    /// More than one input was supplied.
    #[error("workflow '{workflow}' takes at most one input, got {count}")]
    TooManyInputs {
        /// Workflow name.
        workflow: String,
        /// Number of inputs supplied.
        count: usize,
    },

    /// The step list is empty or has empty or repeated names.
    #[error("invalid workflow '{workflow}': {source}")]
    InvalidMachine {
        /// Workflow name.
        workflow: String,
        /// What is wrong with the steps.
        #[source]
        source: MachineError,
    },

    /// Two registrations share a workflow name.
    #[error("workflow '{0}' is registered more than once")]
    DuplicateWorkflow(String),

    /// The processor is already running.
    #[error("workflow processor already started")]
    AlreadyStarted,

    /// The durable store could not be opened.
    #[error("failed to start backend: {0}")]
    BackendStart(#[source] CoreError),

    /// The worker could not be started.
    #[error("failed to start worker: {0}")]
    WorkerStart(#[source] CoreError),

    /// The durable store could not be closed.
    #[error("failed to stop backend: {0}")]
    BackendStop(#[source] CoreError),

    /// The worker did not stop cleanly.
    #[error("failed to stop worker: {0}")]
    WorkerStop(#[source] CoreError),

    /// Every error hit while shutting down.
    #[error("shutdown failed: {}", join_errors(.0))]
    Shutdown(Vec<WorkflowError>),

    /// The workflow finished with a failure.
    #[error("{error_type}: {message}")]
    Failed {
        /// Failure type recorded by the substrate, e.g. `StepFailure`.
        error_type: String,
        /// Failure message, for step failures the handler's error.
        message: String,
    },

    /// The workflow output could not be decoded into the requested type.
    #[error("failed to decode workflow output: {0}")]
    Decode(#[source] serde_json::Error),

    /// The workflow input could not be encoded.
    #[error("failed to encode workflow input: {0}")]
    Encode(#[source] serde_json::Error),

    /// A wait was cancelled before the workflow finished.
    #[error("wait on workflow instance '{instance_id}' was cancelled")]
    Cancelled {
        /// Instance being waited on.
        instance_id: String,
    },

    /// Any other substrate error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

fn join_errors(errors: &[WorkflowError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_lists_every_error() {
        let err = WorkflowError::Shutdown(vec![
            WorkflowError::WorkerStop(CoreError::WorkerStopFailed {
                reason: "task panicked".to_string(),
            }),
            WorkflowError::BackendStop(CoreError::BackendNotStarted),
        ]);
        let message = err.to_string();
        assert!(message.starts_with("shutdown failed: failed to stop worker"));
        assert!(message.contains("task panicked"));
        assert!(message.contains("; failed to stop backend"));
    }

    #[test]
    fn test_failed_display() {
        let err = WorkflowError::Failed {
            error_type: "StepFailure".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "StepFailure: boom");
    }
}
