// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Orchestration and activity functions and the dispatch table they are
//! registered in.

mod activity;
mod orchestration;

pub use activity::ActivityContext;
pub use orchestration::OrchestrationContext;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Failure recorded for an activity attempt or a whole orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Category of the failure (see the associated constants).
    pub error_type: String,
    /// Human readable message.
    pub message: String,
}

impl TaskFailure {
    /// A step handler returned an error.
    pub const STEP_FAILURE: &'static str = "StepFailure";
    /// An input or output could not be decoded.
    pub const DECODE_ERROR: &'static str = "DecodeError";
    /// A function panicked.
    pub const PANIC: &'static str = "Panic";
    /// No activity is registered under the requested name.
    pub const ACTIVITY_NOT_REGISTERED: &'static str = "ActivityNotRegistered";
    /// No orchestrator is registered under the instance's workflow name.
    pub const ORCHESTRATOR_NOT_REGISTERED: &'static str = "OrchestratorNotRegistered";
    /// The substrate failed while driving the orchestration.
    pub const ORCHESTRATION_ERROR: &'static str = "OrchestrationError";

    /// Create a failure with an explicit type.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`Self::STEP_FAILURE`].
    pub fn step_failure(message: impl Into<String>) -> Self {
        Self::new(Self::STEP_FAILURE, message)
    }

    /// Shorthand for a [`Self::DECODE_ERROR`].
    pub fn decode_error(message: impl Into<String>) -> Self {
        Self::new(Self::DECODE_ERROR, message)
    }

    /// Shorthand for a [`Self::PANIC`].
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(Self::PANIC, message)
    }

    pub(crate) fn orchestration_error(err: impl fmt::Display) -> Self {
        Self::new(Self::ORCHESTRATION_ERROR, err.to_string())
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for TaskFailure {}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Result of an orchestration or activity: serialized output or failure.
pub type TaskResult = Result<Vec<u8>, TaskFailure>;

/// A registered activity: one independently retryable unit of work.
pub type ActivityFn = Arc<dyn Fn(ActivityContext) -> BoxFuture<'static, TaskResult> + Send + Sync>;

/// A registered orchestration function, replayed by the worker.
pub type OrchestratorFn =
    Arc<dyn Fn(OrchestrationContext) -> BoxFuture<'static, TaskResult> + Send + Sync>;

/// Dispatch table of named orchestrators and activities.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    orchestrators: HashMap<String, OrchestratorFn>,
    activities: HashMap<String, ActivityFn>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an orchestrator. Names must be unique.
    pub fn add_orchestrator(
        &mut self,
        name: impl Into<String>,
        orchestrator: OrchestratorFn,
    ) -> Result<(), CoreError> {
        let name = name.into();
        if self.orchestrators.contains_key(&name) {
            return Err(CoreError::ValidationError {
                field: "orchestrator".to_string(),
                message: format!("orchestrator '{}' is already registered", name),
            });
        }
        self.orchestrators.insert(name, orchestrator);
        Ok(())
    }

    /// Register an activity. Names must be unique.
    pub fn add_activity(
        &mut self,
        name: impl Into<String>,
        activity: ActivityFn,
    ) -> Result<(), CoreError> {
        let name = name.into();
        if self.activities.contains_key(&name) {
            return Err(CoreError::ValidationError {
                field: "activity".to_string(),
                message: format!("activity '{}' is already registered", name),
            });
        }
        self.activities.insert(name, activity);
        Ok(())
    }

    /// Look up an orchestrator by name.
    pub fn orchestrator(&self, name: &str) -> Option<OrchestratorFn> {
        self.orchestrators.get(name).cloned()
    }

    /// Look up an activity by name.
    pub fn activity(&self, name: &str) -> Option<ActivityFn> {
        self.activities.get(name).cloned()
    }

    /// Registered orchestrator names.
    pub fn orchestrator_names(&self) -> impl Iterator<Item = &str> {
        self.orchestrators.keys().map(String::as_str)
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut orchestrators: Vec<_> = self.orchestrators.keys().collect();
        orchestrators.sort();
        let mut activities: Vec<_> = self.activities.keys().collect();
        activities.sort();
        f.debug_struct("TaskRegistry")
            .field("orchestrators", &orchestrators)
            .field("activities", &activities)
            .finish()
    }
}
