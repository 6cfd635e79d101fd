// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Steps of a workflow chain.

use std::fmt;
use std::sync::Arc;

use statechain_core::RetryPolicy;

/// What a step handler returns. The error is surfaced as the workflow's
/// failure once retries are exhausted.
pub type StepResult = anyhow::Result<()>;

pub(crate) type StepHandler<T> = Arc<dyn Fn(&mut T) -> StepResult + Send + Sync>;

/// One link of a workflow chain: a named handler over the shared payload,
/// with an optional retry policy.
pub struct WorkflowStep<T> {
    pub(crate) name: String,
    pub(crate) handler: StepHandler<T>,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) next: Option<usize>,
}

impl<T> WorkflowStep<T> {
    /// Step that runs `handler` once, failing the workflow on error.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut T) -> StepResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            retry: None,
            next: None,
        }
    }

    /// Retry failed attempts according to `policy`.
    pub fn with_retries(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retry policy, if any.
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// Index of the following step in its workflow. `None` for the last step,
    /// and for steps not yet part of a workflow.
    pub fn next(&self) -> Option<usize> {
        self.next
    }
}

impl<T> Clone for WorkflowStep<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: Arc::clone(&self.handler),
            retry: self.retry.clone(),
            next: self.next,
        }
    }
}

impl<T> fmt::Debug for WorkflowStep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowStep")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}
