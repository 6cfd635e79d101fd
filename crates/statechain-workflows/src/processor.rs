// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow processor: registrations bound to a durable backend.
//!
//! ```text
//! WorkflowProcessorBuilder::register(..) ──► build() ──► start(cancel) ──► run_workflow(..) ──► WorkflowFuture
//!                                                                               │
//!                                                              shutdown() ◄─────┘
//! ```
//!
//! `build` only assembles the dispatch table and the client; nothing touches
//! storage until `start`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use statechain_core::{
    Backend, Config, HubSignals, SqliteBackend, TaskHubClient, TaskHubWorker, TaskRegistry,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Span, info, instrument, warn};

use crate::error::WorkflowError;
use crate::future::WorkflowFuture;
use crate::registration::{Launcher, Registration, WorkflowInputs};
use crate::workflow::Payload;

/// Creates the backend a processor runs on.
pub type BackendFactory = Arc<dyn Fn(&Config) -> Arc<dyn Backend> + Send + Sync>;

fn sqlite_backend(config: &Config) -> Arc<dyn Backend> {
    Arc::new(SqliteBackend::from_config(config))
}

/// Collects registrations and settings for a [`WorkflowProcessor`].
pub struct WorkflowProcessorBuilder {
    registrations: Vec<Registration>,
    backend_factory: Option<BackendFactory>,
    config: Config,
    span: Option<Span>,
}

impl Default for WorkflowProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowProcessorBuilder {
    /// Empty builder with the default configuration and an in-memory store.
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            backend_factory: None,
            config: Config::default(),
            span: None,
        }
    }

    /// Use a different backend. The factory receives the processor config.
    pub fn with_backend_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Config) -> Arc<dyn Backend> + Send + Sync + 'static,
    {
        self.backend_factory = Some(Arc::new(factory));
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Parent span for the worker loop.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Add a workflow.
    pub fn register(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    /// Assemble the processor.
    ///
    /// Fails with [`WorkflowError::DuplicateWorkflow`] if two registrations
    /// share a name.
    pub fn build(self) -> Result<WorkflowProcessor, WorkflowError> {
        let mut registry = TaskRegistry::new();
        let mut launchers = HashMap::new();

        for registration in self.registrations {
            let name = registration.name().to_string();
            if launchers.contains_key(&name) {
                return Err(WorkflowError::DuplicateWorkflow(name));
            }

            registry.add_orchestrator(name.clone(), Arc::clone(registration.orchestrator()))?;
            for (activity, unit) in registration.activities() {
                registry.add_activity(activity.clone(), Arc::clone(unit))?;
            }
            launchers.insert(name, Arc::clone(registration.launcher()));
        }

        let factory: BackendFactory = match self.backend_factory {
            Some(factory) => factory,
            None => Arc::new(sqlite_backend),
        };
        let backend = factory(&self.config);
        let signals = Arc::new(HubSignals::default());
        let client = TaskHubClient::new(
            Arc::clone(&backend),
            Arc::clone(&signals),
            self.config.completion_poll_interval,
        );

        Ok(WorkflowProcessor {
            registry: Arc::new(registry),
            launchers,
            backend,
            client,
            signals,
            config: self.config,
            span: self
                .span
                .unwrap_or_else(|| tracing::info_span!("workflow_processor")),
            worker: Mutex::new(None),
        })
    }
}

/// Runs registered workflows on a durable backend.
pub struct WorkflowProcessor {
    registry: Arc<TaskRegistry>,
    launchers: HashMap<String, Launcher>,
    backend: Arc<dyn Backend>,
    client: TaskHubClient,
    signals: Arc<HubSignals>,
    config: Config,
    span: Span,
    worker: Mutex<Option<TaskHubWorker>>,
}

impl WorkflowProcessor {
    /// Start building a processor.
    pub fn builder() -> WorkflowProcessorBuilder {
        WorkflowProcessorBuilder::new()
    }

    /// Open the backend and start the worker.
    ///
    /// The worker stops when `cancel` fires or on [`WorkflowProcessor::shutdown`].
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), WorkflowError> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Err(WorkflowError::AlreadyStarted);
        }

        self.backend
            .start()
            .await
            .map_err(WorkflowError::BackendStart)?;

        let started = TaskHubWorker::start(
            Arc::clone(&self.backend),
            Arc::clone(&self.registry),
            Arc::clone(&self.signals),
            &self.config,
            cancel,
            self.span.clone(),
        )
        .await
        .map_err(WorkflowError::WorkerStart)?;
        *worker = Some(started);

        info!(workflows = self.launchers.len(), "Workflow processor started");
        Ok(())
    }

    /// Schedule a run of workflow `name`.
    ///
    /// Returns once the run is recorded; use the returned future to wait for
    /// its result.
    #[instrument(skip(self, inputs), fields(inputs = inputs.len()))]
    pub async fn run_workflow(
        &self,
        name: &str,
        inputs: WorkflowInputs,
    ) -> Result<WorkflowFuture, WorkflowError> {
        let launcher = self
            .launchers
            .get(name)
            .ok_or_else(|| WorkflowError::UnknownWorkflow(name.to_string()))?;
        let input = launcher(inputs)?;

        let instance_id = self.client.schedule_new_orchestration(name, &input).await?;
        Ok(WorkflowFuture::new(instance_id, self.client.clone()))
    }

    /// Schedule a run of workflow `name` with a single typed input.
    pub async fn run<T: Payload>(
        &self,
        name: &str,
        input: T,
    ) -> Result<WorkflowFuture, WorkflowError> {
        self.run_workflow(name, WorkflowInputs::one(input)).await
    }

    /// Stop the worker, then the backend.
    ///
    /// Safe to call without a prior start. Errors from both steps are
    /// collected into [`WorkflowError::Shutdown`].
    pub async fn shutdown(&self) -> Result<(), WorkflowError> {
        let mut errors = Vec::new();

        if let Some(mut worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.shutdown().await {
                warn!(error = %e, "Worker did not stop cleanly");
                errors.push(WorkflowError::WorkerStop(e));
            }
        }

        if let Err(e) = self.backend.stop().await {
            warn!(error = %e, "Backend did not stop cleanly");
            errors.push(WorkflowError::BackendStop(e));
        }

        if errors.is_empty() {
            info!("Workflow processor stopped");
            Ok(())
        } else {
            Err(WorkflowError::Shutdown(errors))
        }
    }

    /// Names of the registered workflows.
    pub fn workflow_names(&self) -> impl Iterator<Item = &str> {
        self.launchers.keys().map(String::as_str)
    }

    /// Client for the processor's task hub.
    pub fn client(&self) -> &TaskHubClient {
        &self.client
    }
}

impl fmt::Debug for WorkflowProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowProcessor")
            .field("workflows", &self.launchers.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
