// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Example machine: `StateMachine`.
//!
//! `machines/state_machine.json` describes three transitions, `foo`, `bar`
//! and `baz`, sharing a default retry policy (5 attempts, 1s doubling up to
//! 10s, 60s budget). The build script compiles it into the [`state_machine`]
//! module; this crate supplies the payload and a handler.

use serde::{Deserialize, Serialize};
use statechain_workflows::{Registration, StepResult};

/// Generated from `machines/state_machine.json`.
pub mod state_machine {
    include!(concat!(env!("OUT_DIR"), "/state_machine_state.rs"));
}

pub use state_machine::{
    STATE_MACHINE_WORKFLOW, StateMachineWorkflowHandler, new_state_machine_workflow_registration,
    state_machine_workflow,
};

/// Payload carried through the machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct StateMachine {
    /// Written by `foo`.
    pub a: String,
    /// Written by `bar`.
    pub b: String,
    /// Written by `baz`.
    pub c: String,
}

/// Handler that appends each transition's name to its field.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameAppender;

fn append(field: &mut String, name: &str) {
    if !field.is_empty() {
        field.push(' ');
    }
    field.push_str(name);
}

impl StateMachineWorkflowHandler for NameAppender {
    fn foo(&self, io: &mut StateMachine) -> StepResult {
        append(&mut io.a, "Foo");
        Ok(())
    }

    fn bar(&self, io: &mut StateMachine) -> StepResult {
        append(&mut io.b, "Bar");
        Ok(())
    }

    fn baz(&self, io: &mut StateMachine) -> StepResult {
        append(&mut io.c, "Baz");
        Ok(())
    }
}

/// Registration of `StateMachine` with the [`NameAppender`] handler.
pub fn registration() -> Registration {
    new_state_machine_workflow_registration(NameAppender)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_appends_names() {
        let mut io = StateMachine {
            a: "A".to_string(),
            ..Default::default()
        };
        NameAppender.foo(&mut io).unwrap();
        NameAppender.bar(&mut io).unwrap();
        assert_eq!(io.a, "A Foo");
        assert_eq!(io.b, "Bar");
        assert_eq!(io.c, "");
    }

    #[test]
    fn test_payload_field_names() {
        let json = serde_json::to_value(StateMachine {
            a: "A".to_string(),
            b: "B".to_string(),
            c: "C".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"A": "A", "B": "B", "C": "C"}));
    }
}
