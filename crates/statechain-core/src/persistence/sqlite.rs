// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use std::path::Path;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;
use crate::task::TaskFailure;

use super::{CheckpointRecord, EventRecord, InstanceRecord, Persistence, RetryAttemptRecord};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

const INSTANCE_COLUMNS: &str = "instance_id, workflow_name, status, input, output, failure_type, \
     error, checkpoint_id, created_at, started_at, finished_at";

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// Creates parent directories and the database file if they don't exist,
    /// then runs all migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        Self::migrated(pool).await
    }

    /// Create an in-memory database.
    ///
    /// The pool holds exactly one connection for its whole life: every new
    /// connection to `sqlite::memory:` would see an empty database.
    pub async fn in_memory() -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to open in-memory SQLite: {}", e),
            })?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, CoreError> {
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;

        Ok(Self { pool })
    }

    /// Close the underlying pool. Further queries fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn create_instance(
        &self,
        instance_id: &str,
        workflow_name: &str,
        input: &[u8],
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO instances (instance_id, workflow_name, status, input, created_at)
            VALUES (?, ?, 'pending', ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(instance_id)
        .bind(workflow_name)
        .bind(input)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CoreError::InstanceAlreadyExists {
                    instance_id: instance_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>, CoreError> {
        let query = format!(
            "SELECT {} FROM instances WHERE instance_id = ?",
            INSTANCE_COLUMNS
        );
        let record = sqlx::query_as::<_, InstanceRecord>(&query)
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn claim_pending_instances(&self, limit: i64) -> Result<Vec<InstanceRecord>, CoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            UPDATE instances
            SET status = 'running',
                started_at = COALESCE(started_at, CURRENT_TIMESTAMP)
            WHERE instance_id IN (
                SELECT instance_id FROM instances
                WHERE status = 'pending'
                ORDER BY created_at ASC, rowid ASC
                LIMIT ?
            )
            RETURNING {}
            "#,
            INSTANCE_COLUMNS
        );
        let records = sqlx::query_as::<_, InstanceRecord>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn requeue_running_instances(&self) -> Result<u64, CoreError> {
        let result = sqlx::query("UPDATE instances SET status = 'pending' WHERE status = 'running'")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn complete_instance(
        &self,
        instance_id: &str,
        output: &[u8],
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE instances
            SET status = 'completed', output = ?, finished_at = CURRENT_TIMESTAMP
            WHERE instance_id = ? AND status = 'running'
            "#,
        )
        .bind(output)
        .bind(instance_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail_instance(
        &self,
        instance_id: &str,
        failure: &TaskFailure,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE instances
            SET status = 'failed', failure_type = ?, error = ?, finished_at = CURRENT_TIMESTAMP
            WHERE instance_id = ? AND status = 'running'
            "#,
        )
        .bind(&failure.error_type)
        .bind(&failure.message)
        .bind(instance_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state: &[u8],
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (instance_id, checkpoint_id, state, created_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (instance_id, checkpoint_id) DO NOTHING
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .bind(state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>, CoreError> {
        let record = sqlx::query_as::<_, CheckpointRecord>(
            r#"
            SELECT id, instance_id, checkpoint_id, state, created_at
            FROM checkpoints
            WHERE instance_id = ? AND checkpoint_id = ?
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_instance_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE instances SET checkpoint_id = ? WHERE instance_id = ?")
            .bind(checkpoint_id)
            .bind(instance_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn save_retry_attempt(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        attempt: i32,
        error_message: Option<&str>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO retry_attempts (instance_id, checkpoint_id, attempt, error_message, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .bind(attempt)
        .bind(error_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_retry_attempts(
        &self,
        instance_id: &str,
    ) -> Result<Vec<RetryAttemptRecord>, CoreError> {
        let records = sqlx::query_as::<_, RetryAttemptRecord>(
            r#"
            SELECT instance_id, checkpoint_id, attempt, error_message, created_at
            FROM retry_attempts
            WHERE instance_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert_event(&self, event: &EventRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO events (instance_id, event_type, checkpoint_id, payload, created_at, subtype)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP, ?)
            "#,
        )
        .bind(&event.instance_id)
        .bind(&event.event_type)
        .bind(&event.checkpoint_id)
        .bind(&event.payload)
        .bind(&event.subtype)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_events(&self, instance_id: &str) -> Result<Vec<EventRecord>, CoreError> {
        let records = sqlx::query_as::<_, EventRecord>(
            r#"
            SELECT id, instance_id, event_type, checkpoint_id, payload, created_at, subtype
            FROM events
            WHERE instance_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_instances(
        &self,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InstanceRecord>, CoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM instances
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
            INSTANCE_COLUMNS
        );
        let records = sqlx::query_as::<_, InstanceRecord>(&query)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        let result: Result<(i64,), _> = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await;
        Ok(result.is_ok())
    }
}
