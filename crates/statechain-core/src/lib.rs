// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Statechain Core - Durable Execution Substrate
//!
//! This crate provides the durable orchestration engine that statechain
//! workflows run on. Orchestration instances, activity results and failed
//! attempts are persisted to SQLite so that an instance interrupted by a
//! process restart resumes where it left off.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐ schedule   ┌──────────────────┐  claim   ┌──────────────────┐
//! │  TaskHubClient   │───────────►│     Backend      │◄─────────│  TaskHubWorker   │
//! │ (schedule/wait)  │◄───────────│ (SQLite store)   │─────────►│ (orchestrators)  │
//! └──────────────────┘  metadata  └──────────────────┘ results  └──────────────────┘
//!                                                                       │
//!                                                      OrchestrationContext::call_activity
//!                                                                       │
//!                                                                       ▼
//!                                                              registered activities
//! ```
//!
//! # Checkpoint Semantics
//!
//! Every activity call made from an orchestration gets a deterministic
//! checkpoint id (`<sequence>:<activity name>`):
//!
//! 1. **First execution**: the activity runs (with retries if a
//!    [`RetryPolicy`] is attached) and its output is saved under the id
//! 2. **Replay**: the saved output is returned and the activity is not run
//!
//! On start the worker moves instances left `running` by a previous process
//! back to `pending`, so they are replayed from their checkpoints.
//!
//! # Storage
//!
//! | Table | Content |
//! |-------|---------|
//! | `instances` | One row per orchestration instance: status, input, output or failure |
//! | `checkpoints` | Activity outputs keyed by instance and checkpoint id |
//! | `retry_attempts` | Every failed activity attempt |
//! | `events` | Lifecycle events (scheduled, started, activity_completed, activity_failed, completed, failed) |
//!
//! # Configuration
//!
//! See [`config::Config::from_env`] for the `STATECHAIN_*` environment variables.

#![deny(missing_docs)]

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod persistence;
pub mod retry;
pub mod task;
pub mod worker;

pub use backend::{Backend, SqliteBackend};
pub use client::{HubSignals, OrchestrationMetadata, TaskHubClient};
pub use config::{Config, ConfigError, DatabaseLocation};
pub use error::{CoreError, Result};
pub use persistence::{InstanceStatus, Persistence, SqlitePersistence};
pub use retry::{RetryClassifier, RetryPolicy};
pub use task::{
    ActivityContext, ActivityFn, OrchestrationContext, OrchestratorFn, TaskFailure, TaskRegistry,
    TaskResult,
};
pub use worker::TaskHubWorker;
