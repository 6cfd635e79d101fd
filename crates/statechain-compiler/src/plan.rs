// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compile-time step chain.
//!
//! A [`ChainPlan`] is everything the emitter needs for one machine: the
//! generated identifiers, the payload path, and the ordered steps with their
//! resolved retry policies and index-based `next` links. Building a plan is
//! where every compile-time check happens, so emission itself cannot fail.

use proc_macro2::{Ident, TokenStream};
use statechain_dsl::{MachineDefinition, RetryPolicyDefinition, validate_transitions};

use crate::error::CompileError;
use crate::naming::{
    assign_method_names, derived_ident, path_tokens, to_screaming_snake_case, to_snake_case,
    type_ident,
};

/// One compiled transition.
#[derive(Debug, Clone)]
pub struct StepPlan {
    /// Transition name as written in the description.
    pub name: String,
    /// Handler method bound to this step.
    pub method: Ident,
    /// Effective retry policy, if any.
    pub retry: Option<RetryPolicyDefinition>,
    /// Index of the following step.
    pub next: Option<usize>,
}

/// A validated machine, ready for emission.
#[derive(Debug, Clone)]
pub struct ChainPlan {
    /// Machine name, also the workflow name.
    pub machine: String,
    /// `<MACHINE>_WORKFLOW`
    pub workflow_const: Ident,
    /// `<Machine>WorkflowHandler`
    pub handler_trait: Ident,
    /// `<machine>_workflow`
    pub workflow_fn: Ident,
    /// `new_<machine>_workflow_registration`
    pub registration_fn: Ident,
    /// Payload type path.
    pub payload: TokenStream,
    /// Steps in execution order. The first one is the entrypoint.
    pub steps: Vec<StepPlan>,
}

impl ChainPlan {
    /// Validate a machine and lay out its chain.
    pub fn build(machine: &MachineDefinition) -> Result<Self, CompileError> {
        let name = machine.name.as_str();

        validate_transitions(&machine.transitions).map_err(|source| {
            CompileError::InvalidMachine {
                machine: name.to_string(),
                source,
            }
        })?;

        let type_name = type_ident(name)?;
        let snake = to_snake_case(name);
        let workflow_const = derived_ident(
            name,
            &format!("{}_WORKFLOW", to_screaming_snake_case(name)),
        )?;
        let handler_trait = derived_ident(name, &format!("{}WorkflowHandler", type_name))?;
        let workflow_fn = derived_ident(name, &format!("{}_workflow", snake))?;
        let registration_fn = derived_ident(name, &format!("new_{}_workflow_registration", snake))?;
        let payload = path_tokens(name, &machine.payload_path())?;

        let methods = assign_method_names(name, machine.transitions.iter().map(|t| t.name.as_str()))?;
        let policies = machine.resolved_retry_policies();
        let count = machine.transitions.len();

        let steps = machine
            .transitions
            .iter()
            .zip(methods)
            .zip(policies)
            .enumerate()
            .map(|(index, ((transition, method), retry))| StepPlan {
                name: transition.name.clone(),
                method,
                retry: retry.copied(),
                next: (index + 1 < count).then_some(index + 1),
            })
            .collect();

        Ok(Self {
            machine: name.to_string(),
            workflow_const,
            handler_trait,
            workflow_fn,
            registration_fn,
            payload,
            steps,
        })
    }

    /// The first step.
    pub fn entrypoint(&self) -> &StepPlan {
        // build() rejects machines without transitions
        &self.steps[0]
    }

    /// File the machine's module is written to, `<machine_snake>_state.rs`.
    pub fn file_name(&self) -> String {
        format!("{}_state.rs", to_snake_case(&self.machine))
    }
}
