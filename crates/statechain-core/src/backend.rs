// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backend store lifecycle.
//!
//! A [`Backend`] owns the durable store. Clients and workers reach storage
//! only through [`Backend::persistence`], which fails until the backend has
//! been started and after it has been stopped.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{Config, DatabaseLocation};
use crate::error::CoreError;
use crate::persistence::{Persistence, SqlitePersistence};

/// A startable, stoppable durable store.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Open the store. Starting an already started backend is a no-op.
    async fn start(&self) -> Result<(), CoreError>;

    /// Close the store. Stopping a backend that is not running is a no-op.
    async fn stop(&self) -> Result<(), CoreError>;

    /// Storage handle for the running store.
    async fn persistence(&self) -> Result<Arc<dyn Persistence>, CoreError>;
}

/// SQLite store, in memory or file-backed.
pub struct SqliteBackend {
    location: DatabaseLocation,
    store: RwLock<Option<Arc<SqlitePersistence>>>,
}

impl SqliteBackend {
    /// Create an unstarted backend for `location`.
    pub fn new(location: DatabaseLocation) -> Self {
        Self {
            location,
            store: RwLock::new(None),
        }
    }

    /// Create an unstarted backend for the store described by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.database.clone())
    }

    /// Where the store keeps its data.
    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn start(&self) -> Result<(), CoreError> {
        let mut store = self.store.write().await;
        if store.is_some() {
            debug!("SQLite backend already started");
            return Ok(());
        }

        let persistence = match &self.location {
            DatabaseLocation::Memory => SqlitePersistence::in_memory().await?,
            DatabaseLocation::Path(path) => SqlitePersistence::from_path(path).await?,
        };
        *store = Some(Arc::new(persistence));

        info!(location = ?self.location, "SQLite backend started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), CoreError> {
        let Some(persistence) = self.store.write().await.take() else {
            return Ok(());
        };

        persistence.close().await;
        info!(location = ?self.location, "SQLite backend stopped");
        Ok(())
    }

    async fn persistence(&self) -> Result<Arc<dyn Persistence>, CoreError> {
        match self.store.read().await.as_ref() {
            Some(persistence) => Ok(persistence.clone() as Arc<dyn Persistence>),
            None => Err(CoreError::BackendNotStarted),
        }
    }
}
