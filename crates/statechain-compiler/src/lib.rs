// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! State machine compiler.
//!
//! Compiles machine descriptions (see `statechain-dsl`) into Rust modules that
//! plug into `statechain-workflows`. For each machine the generated module
//! contains:
//!
//! - `<MACHINE>_WORKFLOW`, the workflow name
//! - `<Machine>WorkflowHandler`, a trait with one method per transition
//! - `<machine>_workflow(handler)`, the step chain bound to a handler
//! - `new_<machine>_workflow_registration(handler)`, ready for a processor
//!
//! ```text
//! machines.json ──► validate ──► plan (names, retries, links) ──► emit ──► <machine>_state.rs
//! ```
//!
//! Every check runs while planning, so a description either compiles
//! completely or produces no output at all.

#![deny(missing_docs)]

pub mod codegen;
pub mod compile;
pub mod error;
pub mod naming;
pub mod plan;

pub use compile::{
    CompileOptions, DEFAULT_RUNTIME_CRATE, GeneratedFile, compile_machine, compile_schema,
    load_schema, write_generated_files,
};
pub use error::CompileError;
pub use plan::{ChainPlan, StepPlan};
