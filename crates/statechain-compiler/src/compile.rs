// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compile driver.
//!
//! Turns a whole machine description into generated files. Compilation is
//! all-or-nothing: every machine is planned before anything is emitted, and
//! the first error aborts the run with no output.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use statechain_dsl::{MachineDefinition, SchemaDefinition};
use tracing::{debug, info};

use crate::codegen::{emit_machine, render};
use crate::error::CompileError;
use crate::naming::path_tokens;
use crate::plan::ChainPlan;

/// Runtime crate referenced by generated code unless overridden.
pub const DEFAULT_RUNTIME_CRATE: &str = "statechain_workflows";

/// Options shared by every machine in one compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Path of the workflow runtime crate as seen from generated code.
    pub runtime_crate: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
        }
    }
}

impl CompileOptions {
    /// Use a different runtime crate path, e.g. a re-export.
    pub fn with_runtime_crate(mut self, path: impl Into<String>) -> Self {
        self.runtime_crate = path.into();
        self
    }
}

/// Generated module for one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Machine the file was generated from.
    pub machine: String,
    /// File name, `<machine_snake>_state.rs`.
    pub file_name: String,
    /// Rust source.
    pub contents: String,
}

/// Compile a single machine.
pub fn compile_machine(
    machine: &MachineDefinition,
    options: &CompileOptions,
) -> Result<GeneratedFile, CompileError> {
    let plan = ChainPlan::build(machine)?;
    let rt = path_tokens(&machine.name, &options.runtime_crate)?;
    Ok(emit(&plan, &rt))
}

fn emit(plan: &ChainPlan, rt: &proc_macro2::TokenStream) -> GeneratedFile {
    debug!(machine = %plan.machine, steps = plan.steps.len(), "Emitting machine");
    GeneratedFile {
        machine: plan.machine.clone(),
        file_name: plan.file_name(),
        contents: render(&emit_machine(plan, rt)),
    }
}

/// Compile every machine of a description.
///
/// Fails without producing anything if any machine is invalid or two
/// machines would be written to the same file.
pub fn compile_schema(
    schema: &SchemaDefinition,
    options: &CompileOptions,
) -> Result<Vec<GeneratedFile>, CompileError> {
    let mut plans = Vec::with_capacity(schema.machines.len());
    let mut file_names = HashSet::new();

    for machine in &schema.machines {
        let plan = ChainPlan::build(machine)?;
        if !file_names.insert(plan.file_name()) {
            return Err(CompileError::DuplicateMachine {
                name: machine.name.clone(),
            });
        }
        let rt = path_tokens(&machine.name, &options.runtime_crate)?;
        plans.push((plan, rt));
    }

    let files: Vec<_> = plans.iter().map(|(plan, rt)| emit(plan, rt)).collect();
    info!(machines = files.len(), "Compiled machine description");
    Ok(files)
}

/// Read and parse a machine description file.
pub fn load_schema(path: &Path) -> Result<SchemaDefinition, CompileError> {
    let json = fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
    Ok(statechain_dsl::parse_schema(&json)?)
}

/// Write generated files into `dir`, creating it if needed.
///
/// Returns the written paths in input order.
pub fn write_generated_files(
    files: &[GeneratedFile],
    dir: &Path,
) -> Result<Vec<PathBuf>, CompileError> {
    fs::create_dir_all(dir).map_err(|e| CompileError::io(dir, e))?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.file_name);
        fs::write(&path, &file.contents).map_err(|e| CompileError::io(&path, e))?;
        info!(machine = %file.machine, path = %path.display(), "Wrote generated module");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use statechain_dsl::TransitionDefinition;

    fn machine(name: &str, transitions: &[&str]) -> MachineDefinition {
        MachineDefinition {
            name: name.to_string(),
            payload: None,
            default_retry_policy: None,
            transitions: transitions
                .iter()
                .map(|t| TransitionDefinition::new(*t))
                .collect(),
        }
    }

    #[test]
    fn test_compile_schema_one_file_per_machine() {
        let schema = SchemaDefinition {
            machines: vec![machine("Checkout", &["pay", "ship"]), machine("Refund", &["undo"])],
        };
        let files = compile_schema(&schema, &CompileOptions::default()).unwrap();

        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["checkout_state.rs", "refund_state.rs"]);
        assert!(files[0].contents.contains("CHECKOUT_WORKFLOW"));
        assert!(files[1].contents.contains("REFUND_WORKFLOW"));
    }

    #[test]
    fn test_one_bad_machine_fails_everything() {
        let schema = SchemaDefinition {
            machines: vec![machine("Good", &["a"]), machine("Bad", &["x", "x"])],
        };
        let err = compile_schema(&schema, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidMachine { ref machine, .. } if machine == "Bad"));
    }

    #[test]
    fn test_duplicate_machine() {
        let schema = SchemaDefinition {
            machines: vec![machine("Order", &["a"]), machine("Order", &["b"])],
        };
        assert!(matches!(
            compile_schema(&schema, &CompileOptions::default()),
            Err(CompileError::DuplicateMachine { ref name }) if name == "Order"
        ));
    }

    #[test]
    fn test_custom_runtime_crate() {
        let options = CompileOptions::default().with_runtime_crate("crate::rt");
        let file = compile_machine(&machine("M", &["a"]), &options).unwrap();
        assert!(file.contents.contains("crate :: rt :: WorkflowStep"));

        let options = CompileOptions::default().with_runtime_crate("not a path");
        assert!(matches!(
            compile_machine(&machine("M", &["a"]), &options),
            Err(CompileError::InvalidPath { .. })
        ));
    }
}
