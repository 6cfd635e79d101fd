// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for statechain-core.
//!
//! This module defines the persistence abstraction and the SQLite implementation.

pub mod sqlite;

pub use self::sqlite::SqlitePersistence;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::task::TaskFailure;

/// Lifecycle status of an orchestration instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceStatus {
    /// Scheduled, waiting for a worker.
    Pending,
    /// Claimed by a worker (or abandoned by one that stopped).
    Running,
    /// Finished with an output.
    Completed,
    /// Finished with a failure.
    Failed,
}

impl InstanceStatus {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse the database representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether the instance has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance record from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstanceRecord {
    /// Unique identifier for the instance.
    pub instance_id: String,
    /// Name of the orchestrator that drives the instance.
    pub workflow_name: String,
    /// Current status (pending, running, completed, failed).
    pub status: String,
    /// Serialized orchestration input.
    pub input: Vec<u8>,
    /// Serialized output from successful completion.
    pub output: Option<Vec<u8>>,
    /// Failure category, set on failure.
    pub failure_type: Option<String>,
    /// Failure message, set on failure.
    pub error: Option<String>,
    /// Last checkpoint saved for the instance.
    pub checkpoint_id: Option<String>,
    /// When the instance was scheduled.
    pub created_at: DateTime<Utc>,
    /// When a worker first claimed the instance.
    pub started_at: Option<DateTime<Utc>>,
    /// When the instance finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl InstanceRecord {
    /// Parsed status. Unknown values are reported as `None`.
    pub fn status(&self) -> Option<InstanceStatus> {
        InstanceStatus::parse(&self.status)
    }

    /// Recorded failure, if the instance failed.
    pub fn failure(&self) -> Option<TaskFailure> {
        match (&self.failure_type, &self.error) {
            (None, None) => None,
            (error_type, message) => Some(TaskFailure::new(
                error_type
                    .clone()
                    .unwrap_or_else(|| TaskFailure::ORCHESTRATION_ERROR.to_string()),
                message.clone().unwrap_or_default(),
            )),
        }
    }
}

/// Checkpoint record: the stored result of a completed activity call.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CheckpointRecord {
    /// Database primary key.
    pub id: i64,
    /// Instance this checkpoint belongs to.
    pub instance_id: String,
    /// Deterministic checkpoint identifier within the instance.
    pub checkpoint_id: String,
    /// Serialized activity output.
    pub state: Vec<u8>,
    /// When the checkpoint was created.
    pub created_at: DateTime<Utc>,
}

/// A failed activity attempt.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RetryAttemptRecord {
    /// Instance the attempt belongs to.
    pub instance_id: String,
    /// Checkpoint the attempt would have produced.
    pub checkpoint_id: String,
    /// 1-indexed attempt number.
    pub attempt: i32,
    /// Failure message.
    pub error_message: Option<String>,
    /// When the attempt failed.
    pub created_at: DateTime<Utc>,
}

/// Event record from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRecord {
    /// Database primary key (None when inserting new events).
    #[sqlx(default)]
    pub id: Option<i64>,
    /// Instance this event belongs to.
    pub instance_id: String,
    /// Type of event (scheduled, started, activity_completed, activity_failed, completed, failed).
    pub event_type: String,
    /// Associated checkpoint ID if applicable.
    pub checkpoint_id: Option<String>,
    /// Optional event payload data.
    pub payload: Option<Vec<u8>>,
    /// When the event occurred.
    pub created_at: DateTime<Utc>,
    /// Optional subtype, e.g. the activity name.
    pub subtype: Option<String>,
}

impl EventRecord {
    /// Build a new event for insertion.
    pub fn new(instance_id: &str, event_type: &str) -> Self {
        Self {
            id: None,
            instance_id: instance_id.to_string(),
            event_type: event_type.to_string(),
            checkpoint_id: None,
            payload: None,
            created_at: Utc::now(),
            subtype: None,
        }
    }

    /// Attach a checkpoint ID.
    pub fn with_checkpoint(mut self, checkpoint_id: &str) -> Self {
        self.checkpoint_id = Some(checkpoint_id.to_string());
        self
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach a subtype.
    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_string());
        self
    }
}

/// Event type names stored in the events table.
pub mod event_types {
    /// Instance was scheduled.
    pub const SCHEDULED: &str = "scheduled";
    /// A worker began (or resumed) driving the instance.
    pub const STARTED: &str = "started";
    /// An activity call produced a checkpoint.
    pub const ACTIVITY_COMPLETED: &str = "activity_completed";
    /// An activity attempt failed.
    pub const ACTIVITY_FAILED: &str = "activity_failed";
    /// Instance completed.
    pub const COMPLETED: &str = "completed";
    /// Instance failed.
    pub const FAILED: &str = "failed";
}

/// Storage operations needed by the client, worker and orchestration context.
#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    /// Insert a new pending instance.
    async fn create_instance(
        &self,
        instance_id: &str,
        workflow_name: &str,
        input: &[u8],
    ) -> Result<(), CoreError>;

    /// Fetch an instance by ID.
    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>, CoreError>;

    /// Atomically move up to `limit` pending instances to running, oldest first.
    async fn claim_pending_instances(&self, limit: i64) -> Result<Vec<InstanceRecord>, CoreError>;

    /// Move every running instance back to pending. Returns how many moved.
    async fn requeue_running_instances(&self) -> Result<u64, CoreError>;

    /// Record a successful completion if the instance is still running.
    async fn complete_instance(&self, instance_id: &str, output: &[u8])
    -> Result<bool, CoreError>;

    /// Record a failure if the instance is still running.
    async fn fail_instance(
        &self,
        instance_id: &str,
        failure: &TaskFailure,
    ) -> Result<bool, CoreError>;

    /// Store the output of an activity call.
    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state: &[u8],
    ) -> Result<(), CoreError>;

    /// Load a stored activity output.
    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>, CoreError>;

    /// Remember the most recent checkpoint on the instance row.
    async fn update_instance_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<(), CoreError>;

    /// Record a failed activity attempt.
    async fn save_retry_attempt(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        attempt: i32,
        error_message: Option<&str>,
    ) -> Result<(), CoreError>;

    /// List failed attempts of an instance in insertion order.
    async fn list_retry_attempts(
        &self,
        instance_id: &str,
    ) -> Result<Vec<RetryAttemptRecord>, CoreError>;

    /// Append a lifecycle event.
    async fn insert_event(&self, event: &EventRecord) -> Result<(), CoreError>;

    /// List events of an instance in insertion order.
    async fn list_events(&self, instance_id: &str) -> Result<Vec<EventRecord>, CoreError>;

    /// List instances, newest first, optionally filtered by status.
    async fn list_instances(
        &self,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InstanceRecord>, CoreError>;

    /// Check that the database answers queries.
    async fn health_check_db(&self) -> Result<bool, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            InstanceStatus::Pending,
            InstanceStatus::Running,
            InstanceStatus::Completed,
            InstanceStatus::Failed,
        ] {
            assert_eq!(InstanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InstanceStatus::parse("suspended"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!InstanceStatus::Pending.is_terminal());
        assert!(!InstanceStatus::Running.is_terminal());
        assert!(InstanceStatus::Completed.is_terminal());
        assert!(InstanceStatus::Failed.is_terminal());
    }
}
