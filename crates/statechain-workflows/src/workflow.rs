// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow descriptor and orchestration driver.
//!
//! A [`Workflow`] is an ordered chain of [`WorkflowStep`]s over one payload
//! type. It exposes each step as an activity (decode payload, run handler,
//! encode payload) and a single orchestrator that calls those activities in
//! chain order, feeding each step the previous step's output.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use statechain_core::task::panic_message;
use statechain_core::{
    ActivityContext, ActivityFn, OrchestrationContext, OrchestratorFn, TaskFailure, TaskResult,
};
use statechain_dsl::validate_transition_names;
use tracing::{debug, info};

use crate::error::WorkflowError;
use crate::step::{StepHandler, WorkflowStep};

/// Types that can flow through a workflow chain.
///
/// Payloads cross every step boundary as JSON. A run started without input
/// begins from `Default::default()`.
pub trait Payload: Serialize + DeserializeOwned + Default + Send + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Default + Send + 'static {}

/// Where a running chain is.
#[derive(Debug)]
enum ChainState {
    PendingStep(usize),
    Completed,
    Failed(TaskFailure),
}

/// A named, linear chain of steps.
pub struct Workflow<T> {
    name: String,
    steps: Arc<[WorkflowStep<T>]>,
}

impl<T> Workflow<T> {
    /// Build a workflow, rejecting an empty chain and empty or repeated
    /// step names.
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep<T>>) -> Result<Self, WorkflowError> {
        let name = name.into();
        validate_transition_names(steps.iter().map(|s| s.name.as_str())).map_err(|source| {
            WorkflowError::InvalidMachine {
                workflow: name.clone(),
                source,
            }
        })?;
        Ok(Self::from_validated(name, steps))
    }

    /// Build a workflow from steps that were already validated, as generated
    /// code does. Links each step to the one after it.
    pub fn from_validated(name: impl Into<String>, mut steps: Vec<WorkflowStep<T>>) -> Self {
        let count = steps.len();
        for (index, step) in steps.iter_mut().enumerate() {
            step.next = (index + 1 < count).then_some(index + 1);
        }
        Self {
            name: name.into(),
            steps: steps.into(),
        }
    }

    /// Workflow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First step of the chain.
    pub fn entrypoint(&self) -> Option<&WorkflowStep<T>> {
        self.steps.first()
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[WorkflowStep<T>] {
        &self.steps
    }

    /// Name a step's activity is registered under, `<workflow>::<step>`.
    pub fn activity_name(&self, step: &WorkflowStep<T>) -> String {
        format!("{}::{}", self.name, step.name)
    }
}

impl<T: Payload> Workflow<T> {
    /// Every step as a named activity, in chain order.
    pub fn activities(&self) -> Vec<(String, ActivityFn)> {
        self.steps
            .iter()
            .map(|step| (self.activity_name(step), step_activity(step)))
            .collect()
    }

    /// The orchestration function driving this chain.
    pub fn orchestrator(&self) -> OrchestratorFn {
        let workflow = self.clone();
        Arc::new(move |ctx: OrchestrationContext| {
            let workflow = workflow.clone();
            async move { workflow.drive(ctx).await }.boxed()
        })
    }

    /// Run the chain inside an orchestration.
    ///
    /// The orchestration input is handed to the entrypoint, each step's output
    /// to the next step, and the last output becomes the result. The first
    /// step that fails for good fails the whole run and no later step runs.
    pub async fn drive(&self, mut ctx: OrchestrationContext) -> TaskResult {
        info!(workflow = %self.name, instance_id = %ctx.instance_id(), "Driving workflow");

        let mut payload = ctx.raw_input().to_vec();
        let mut state = match self.entrypoint() {
            Some(_) => ChainState::PendingStep(0),
            None => ChainState::Completed,
        };

        loop {
            let index = match state {
                ChainState::PendingStep(index) => index,
                ChainState::Completed => {
                    debug!(workflow = %self.name, "Workflow completed");
                    return Ok(payload);
                }
                ChainState::Failed(failure) => {
                    debug!(workflow = %self.name, error = %failure, "Workflow failed");
                    return Err(failure);
                }
            };

            let step = &self.steps[index];
            let activity = self.activity_name(step);
            debug!(workflow = %self.name, step = %step.name, "Running step");

            state = match ctx
                .call_activity_raw(&activity, std::mem::take(&mut payload), step.retry.as_ref())
                .await
            {
                Ok(output) => {
                    payload = output;
                    step.next.map_or(ChainState::Completed, ChainState::PendingStep)
                }
                Err(failure) => ChainState::Failed(failure),
            };
        }
    }
}

/// Unit of work for one step: decode, run the handler off the async
/// threads, encode.
fn step_activity<T: Payload>(step: &WorkflowStep<T>) -> ActivityFn {
    let handler: StepHandler<T> = Arc::clone(&step.handler);
    let step_name: Arc<str> = step.name.as_str().into();

    Arc::new(move |ctx: ActivityContext| {
        let handler = Arc::clone(&handler);
        let step_name = Arc::clone(&step_name);
        async move {
            let mut payload: T = ctx.get_input()?;
            debug!(step = %step_name, attempt = ctx.attempt(), "Running step handler");

            let payload = tokio::task::spawn_blocking(move || {
                handler(&mut payload).map(|()| payload)
            })
            .await
            .map_err(|e| {
                if e.is_panic() {
                    let panic = e.into_panic();
                    TaskFailure::panic(format!(
                        "step '{}' panicked: {}",
                        step_name,
                        panic_message(panic.as_ref())
                    ))
                } else {
                    TaskFailure::new(
                        TaskFailure::ORCHESTRATION_ERROR,
                        format!("step '{}' was aborted: {}", step_name, e),
                    )
                }
            })?
            .map_err(|e| TaskFailure::step_failure(format!("{:#}", e)))?;

            serde_json::to_vec(&payload).map_err(|e| {
                TaskFailure::new(
                    TaskFailure::ORCHESTRATION_ERROR,
                    format!("encoding output of step '{}': {}", step_name, e),
                )
            })
        }
        .boxed()
    })
}

impl<T> Clone for Workflow<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            steps: Arc::clone(&self.steps),
        }
    }
}

impl<T> fmt::Debug for Workflow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use statechain_dsl::MachineError;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: i64,
        trail: Vec<String>,
    }

    fn push(name: &'static str) -> WorkflowStep<Counter> {
        WorkflowStep::new(name, move |c: &mut Counter| {
            c.value += 1;
            c.trail.push(name.to_string());
            Ok(())
        })
    }

    async fn run_activity(activity: &ActivityFn, input: &Counter) -> TaskResult {
        let ctx = ActivityContext::new("instance-1", "step", 1, serde_json::to_vec(input).unwrap());
        activity(ctx).await
    }

    #[test]
    fn test_chain_links() {
        let workflow = Workflow::new("Counting", vec![push("a"), push("b"), push("c")]).unwrap();

        assert_eq!(workflow.name(), "Counting");
        assert_eq!(workflow.entrypoint().map(|s| s.name()), Some("a"));
        let links: Vec<_> = workflow.steps().iter().map(|s| s.next()).collect();
        assert_eq!(links, vec![Some(1), Some(2), None]);
    }

    #[test]
    fn test_new_rejects_invalid_chains() {
        let err = Workflow::new("Counting", vec![push("a"), push("a")]).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidMachine {
                source: MachineError::DuplicateTransitionName { .. },
                ..
            }
        ));

        let err = Workflow::<Counter>::new("Counting", vec![]).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidMachine {
                source: MachineError::NoTransitions,
                ..
            }
        ));
    }

    #[test]
    fn test_activity_names_are_qualified() {
        let workflow = Workflow::new("Counting", vec![push("a"), push("b")]).unwrap();
        let names: Vec<_> = workflow.activities().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Counting::a", "Counting::b"]);
    }

    #[test]
    fn test_retry_policy_kept_on_step() {
        let step = push("a").with_retries(statechain_core::RetryPolicy::new(
            5,
            std::time::Duration::from_secs(1),
        ));
        assert_eq!(step.retry_policy().map(|p| p.max_attempts), Some(5));
        assert!(push("b").retry_policy().is_none());
    }

    #[tokio::test]
    async fn test_activity_runs_handler() {
        let workflow = Workflow::new("Counting", vec![push("a")]).unwrap();
        let (_, activity) = workflow.activities().remove(0);

        let output = run_activity(&activity, &Counter::default()).await.unwrap();
        let counter: Counter = serde_json::from_slice(&output).unwrap();
        assert_eq!(
            counter,
            Counter {
                value: 1,
                trail: vec!["a".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_activity_handler_error() {
        let step = WorkflowStep::new("fail", |_: &mut Counter| {
            Err(anyhow::anyhow!("disk full").context("saving counter"))
        });
        let workflow = Workflow::new("Counting", vec![step]).unwrap();
        let (_, activity) = workflow.activities().remove(0);

        let failure = run_activity(&activity, &Counter::default()).await.unwrap_err();
        assert_eq!(failure.error_type, TaskFailure::STEP_FAILURE);
        assert_eq!(failure.message, "saving counter: disk full");
    }

    #[tokio::test]
    async fn test_activity_handler_panic() {
        let step = WorkflowStep::new("explode", |_: &mut Counter| -> crate::StepResult {
            panic!("handler bug")
        });
        let workflow = Workflow::new("Counting", vec![step]).unwrap();
        let (_, activity) = workflow.activities().remove(0);

        let failure = run_activity(&activity, &Counter::default()).await.unwrap_err();
        assert_eq!(failure.error_type, TaskFailure::PANIC);
        assert!(failure.message.contains("handler bug"));
    }

    #[tokio::test]
    async fn test_activity_rejects_foreign_payload() {
        let workflow = Workflow::new("Counting", vec![push("a")]).unwrap();
        let (_, activity) = workflow.activities().remove(0);

        let ctx = ActivityContext::new("instance-1", "step", 1, b"[1, 2, 3]".to_vec());
        let failure = activity(ctx).await.unwrap_err();
        assert_eq!(failure.error_type, TaskFailure::DECODE_ERROR);
    }
}
