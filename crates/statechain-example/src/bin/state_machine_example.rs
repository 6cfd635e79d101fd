// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! State Machine Example - runs the compiled `StateMachine` workflow.
//!
//! This example shows:
//! - Building a processor from a generated registration
//! - Running the machine with and without input
//! - Waiting for and decoding the final payload
//!
//! Set `STATECHAIN_DATABASE_PATH` to keep runs in a SQLite file instead of
//! memory.
//!
//! Run with: cargo run -p statechain-example --bin state_machine_example

use statechain_example::{STATE_MACHINE_WORKFLOW, StateMachine, registration};
use statechain_workflows::{Config, WorkflowInputs, WorkflowProcessor};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("=== State Machine Example ===");

    let config = Config::from_env()?;
    let processor = WorkflowProcessor::builder()
        .with_config(config)
        .register(registration())
        .build()?;

    let cancel = CancellationToken::new();
    processor.start(cancel.clone()).await?;

    let input = StateMachine {
        a: "A".to_string(),
        b: "B".to_string(),
        c: "C".to_string(),
    };
    let run = processor.run(STATE_MACHINE_WORKFLOW, input).await?;
    info!(instance_id = %run.id(), "Started run with input");
    let output: StateMachine = run.wait_for(&cancel).await?;
    info!(?output, "Run with input finished");

    let run = processor
        .run_workflow(STATE_MACHINE_WORKFLOW, WorkflowInputs::none())
        .await?;
    info!(instance_id = %run.id(), "Started run without input");
    let output = run.wait(&cancel).await?;
    info!(output = %output, "Run without input finished");

    processor.shutdown().await?;
    Ok(())
}
