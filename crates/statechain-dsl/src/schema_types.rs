// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Machine description types.
//!
//! A schema file lists one or more linear state machines. Each machine is an
//! ordered list of named transitions that run one after another, with an
//! optional retry policy per transition and an optional default for the
//! whole machine.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Root of a machine description file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SchemaDefinition {
    /// Machines to compile, each into its own module.
    pub machines: Vec<MachineDefinition>,
}

/// A linear state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MachineDefinition {
    /// Machine name. Used as the workflow name and, by default, the payload type.
    pub name: String,

    /// Rust path of the payload type, relative to the generated module.
    /// Defaults to `super::<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    /// Policy for transitions that don't declare their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_retry_policy: Option<RetryPolicyDefinition>,

    /// Transitions in execution order.
    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
}

impl MachineDefinition {
    /// Payload type path, falling back to `super::<name>`.
    pub fn payload_path(&self) -> String {
        match &self.payload {
            Some(path) if !path.trim().is_empty() => path.trim().to_string(),
            _ => format!("super::{}", self.name),
        }
    }
}

/// One step of a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransitionDefinition {
    /// Transition name, unique within the machine.
    pub name: String,

    /// Policy for this transition only. Replaces the machine default entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicyDefinition>,
}

impl TransitionDefinition {
    /// Transition without a retry policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            retry_policy: None,
        }
    }

    /// Attach a retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicyDefinition) -> Self {
        self.retry_policy = Some(policy);
        self
    }
}

/// Exponential backoff settings, in whole seconds.
///
/// Values are carried verbatim into generated code; the runtime applies its
/// own minimums when executing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryPolicyDefinition {
    /// Total attempts including the first.
    #[serde(default)]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default)]
    pub initial_retry_interval_seconds: u64,
    /// Multiplier applied to the delay after each retry.
    #[serde(default)]
    pub backoff_coefficient: f64,
    /// Cap for a single delay. Zero means uncapped.
    #[serde(default)]
    pub max_retry_interval_seconds: u64,
    /// Budget for all attempts, measured from the first. Zero means unbounded.
    #[serde(default)]
    pub retry_timeout_seconds: u64,
}

impl RetryPolicyDefinition {
    /// Delay before the first retry.
    pub fn initial_retry_interval(&self) -> Duration {
        Duration::from_secs(self.initial_retry_interval_seconds)
    }

    /// Cap for a single delay.
    pub fn max_retry_interval(&self) -> Duration {
        Duration::from_secs(self.max_retry_interval_seconds)
    }

    /// Budget for all attempts.
    pub fn retry_timeout(&self) -> Duration {
        Duration::from_secs(self.retry_timeout_seconds)
    }
}
