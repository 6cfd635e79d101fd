// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Registrations: a workflow packaged for a processor.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use statechain_core::{ActivityFn, OrchestratorFn};

use crate::error::WorkflowError;
use crate::workflow::{Payload, Workflow};

/// Inputs passed when launching a run.
///
/// A workflow accepts zero or one input. With none the run starts from the
/// payload's default value; a single input must be of the payload type.
#[derive(Default)]
pub struct WorkflowInputs(Vec<Box<dyn Any + Send>>);

impl WorkflowInputs {
    /// No input.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single input.
    pub fn one<T: Any + Send>(value: T) -> Self {
        Self::none().with(value)
    }

    /// Append an input.
    pub fn with<T: Any + Send>(mut self, value: T) -> Self {
        self.0.push(Box::new(value));
        self
    }

    /// Number of inputs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no input was given.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for WorkflowInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkflowInputs").field(&self.0.len()).finish()
    }
}

/// Checks launch inputs against the payload type and encodes them.
pub type Launcher = Arc<dyn Fn(WorkflowInputs) -> Result<Vec<u8>, WorkflowError> + Send + Sync>;

/// A workflow's orchestrator, activities and launcher under one name.
#[derive(Clone)]
pub struct Registration {
    name: String,
    orchestrator: OrchestratorFn,
    activities: Vec<(String, ActivityFn)>,
    launcher: Launcher,
}

impl Registration {
    /// Package a workflow.
    pub fn new<T: Payload>(workflow: Workflow<T>) -> Self {
        let name = workflow.name().to_string();
        Self {
            orchestrator: workflow.orchestrator(),
            activities: workflow.activities(),
            launcher: launcher::<T>(name.clone()),
            name,
        }
    }

    /// Workflow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Orchestration function.
    pub fn orchestrator(&self) -> &OrchestratorFn {
        &self.orchestrator
    }

    /// Named units of work, in chain order.
    pub fn activities(&self) -> &[(String, ActivityFn)] {
        &self.activities
    }

    /// Launcher checking and encoding inputs.
    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    /// Check and encode launch inputs.
    pub fn encode_input(&self, inputs: WorkflowInputs) -> Result<Vec<u8>, WorkflowError> {
        (self.launcher)(inputs)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field(
                "activities",
                &self.activities.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

fn launcher<T: Payload>(workflow: String) -> Launcher {
    Arc::new(move |inputs: WorkflowInputs| {
        let mut inputs = inputs.0;
        if inputs.len() > 1 {
            return Err(WorkflowError::TooManyInputs {
                workflow: workflow.clone(),
                count: inputs.len(),
            });
        }

        let payload = match inputs.pop() {
            None => T::default(),
            Some(input) => *input.downcast::<T>().map_err(|_| WorkflowError::InputTypeMismatch {
                workflow: workflow.clone(),
                expected: type_name::<T>(),
            })?,
        };

        serde_json::to_vec(&payload).map_err(WorkflowError::Encode)
    })
}
