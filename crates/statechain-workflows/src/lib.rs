// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Statechain Workflows - durable step chains
//!
//! Runs linear state machines as durable orchestrations on
//! `statechain-core`. A machine is a [`Workflow`]: an ordered chain of
//! [`WorkflowStep`]s, each a handler that mutates one shared payload. Every
//! step runs as its own activity, so a completed step is never repeated
//! after a restart, and failed attempts are retried per the step's
//! [`RetryPolicy`].
//!
//! Modules generated by `statechain-compile` build workflows and
//! registrations from a handler trait; they can also be built by hand:
//!
//! ```no_run
//! use statechain_workflows::{
//!     Registration, Workflow, WorkflowInputs, WorkflowProcessor, WorkflowStep,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), statechain_workflows::WorkflowError> {
//! let workflow = Workflow::new(
//!     "Greeting",
//!     vec![
//!         WorkflowStep::new("hello", |s: &mut String| {
//!             s.push_str("hello");
//!             Ok(())
//!         }),
//!         WorkflowStep::new("world", |s: &mut String| {
//!             s.push_str(" world");
//!             Ok(())
//!         }),
//!     ],
//! )?;
//!
//! let processor = WorkflowProcessor::builder()
//!     .register(Registration::new(workflow))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! processor.start(cancel.clone()).await?;
//! let run = processor.run_workflow("Greeting", WorkflowInputs::none()).await?;
//! let greeting: String = run.wait_for(&cancel).await?;
//! assert_eq!(greeting, "hello world");
//! processor.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod future;
pub mod processor;
pub mod registration;
pub mod step;
pub mod workflow;

pub use error::WorkflowError;
pub use future::WorkflowFuture;
pub use processor::{BackendFactory, WorkflowProcessor, WorkflowProcessorBuilder};
pub use registration::{Launcher, Registration, WorkflowInputs};
pub use step::{StepResult, WorkflowStep};
pub use workflow::{Payload, Workflow};

// Generated code and processor users need these without a direct
// statechain-core dependency.
pub use statechain_core::{Config, InstanceStatus, OrchestrationMetadata, RetryPolicy};
