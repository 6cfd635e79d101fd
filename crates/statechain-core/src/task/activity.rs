// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::de::DeserializeOwned;

use super::TaskFailure;

/// Context handed to a single activity attempt.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    instance_id: String,
    name: String,
    attempt: u32,
    input: Vec<u8>,
}

impl ActivityContext {
    /// Create a context for attempt `attempt` (1-indexed) of activity `name`.
    pub fn new(
        instance_id: impl Into<String>,
        name: impl Into<String>,
        attempt: u32,
        input: Vec<u8>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
            attempt,
            input,
        }
    }

    /// Orchestration instance this attempt belongs to.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Registered activity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-indexed attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Serialized input.
    pub fn raw_input(&self) -> &[u8] {
        &self.input
    }

    /// Decode the input.
    pub fn get_input<T: DeserializeOwned>(&self) -> Result<T, TaskFailure> {
        serde_json::from_slice(&self.input).map_err(|e| {
            TaskFailure::decode_error(format!("activity '{}' input: {}", self.name, e))
        })
    }
}
