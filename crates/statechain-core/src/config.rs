// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Where the durable store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DatabaseLocation {
    /// Process-local, lost on exit.
    #[default]
    Memory,
    /// SQLite database file.
    Path(PathBuf),
}

/// Substrate configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Durable store location.
    pub database: DatabaseLocation,
    /// How often the worker polls for pending instances without a wake-up.
    pub worker_poll_interval: Duration,
    /// Maximum orchestrations a worker drives at once.
    pub max_concurrent_orchestrations: usize,
    /// How often a completion wait re-reads the instance without a wake-up.
    pub completion_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            worker_poll_interval: Duration::from_millis(100),
            max_concurrent_orchestrations: 32,
            completion_poll_interval: Duration::from_millis(50),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `STATECHAIN_DATABASE_PATH`: SQLite file (default: in-memory)
    /// - `STATECHAIN_WORKER_POLL_INTERVAL_MS`: worker poll cadence (default: 100)
    /// - `STATECHAIN_MAX_CONCURRENT_ORCHESTRATIONS`: worker concurrency (default: 32)
    /// - `STATECHAIN_COMPLETION_POLL_INTERVAL_MS`: wait poll cadence (default: 50)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database = match std::env::var("STATECHAIN_DATABASE_PATH") {
            Ok(path) if !path.trim().is_empty() => DatabaseLocation::Path(PathBuf::from(path)),
            _ => DatabaseLocation::Memory,
        };

        let worker_poll_ms: u64 = std::env::var("STATECHAIN_WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "STATECHAIN_WORKER_POLL_INTERVAL_MS",
                    "must be a non-negative integer",
                )
            })?;

        let max_concurrent_orchestrations: usize =
            std::env::var("STATECHAIN_MAX_CONCURRENT_ORCHESTRATIONS")
                .unwrap_or_else(|_| "32".to_string())
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid(
                    "STATECHAIN_MAX_CONCURRENT_ORCHESTRATIONS",
                    "must be a positive integer",
                ))?;

        let completion_poll_ms: u64 = std::env::var("STATECHAIN_COMPLETION_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "STATECHAIN_COMPLETION_POLL_INTERVAL_MS",
                    "must be a non-negative integer",
                )
            })?;

        Ok(Self {
            database,
            worker_poll_interval: Duration::from_millis(worker_poll_ms),
            max_concurrent_orchestrations,
            completion_poll_interval: Duration::from_millis(completion_poll_ms),
        })
    }

    /// Use a file-backed SQLite store.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = DatabaseLocation::Path(path.into());
        self
    }

    /// Use an in-memory store.
    pub fn in_memory(mut self) -> Self {
        self.database = DatabaseLocation::Memory;
        self
    }

    /// Set the worker poll interval.
    pub fn with_worker_poll_interval(mut self, interval: Duration) -> Self {
        self.worker_poll_interval = interval;
        self
    }

    /// Set the worker concurrency limit. Zero is treated as one.
    pub fn with_max_concurrent_orchestrations(mut self, max: usize) -> Self {
        self.max_concurrent_orchestrations = max.max(1);
        self
    }

    /// Set the completion wait poll interval.
    pub fn with_completion_poll_interval(mut self, interval: Duration) -> Self {
        self.completion_poll_interval = interval;
        self
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
