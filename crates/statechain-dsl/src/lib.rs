// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Machine description DSL.
//!
//! This crate defines the JSON description of linear state machines consumed
//! by `statechain-compiler`:
//! - Deserialization of machine description files
//! - Transition validation (non-empty, unique names)
//! - Retry policy resolution (per-transition, else machine default, else none)
//! - JSON Schema of the format via schemars
//!
//! ```json
//! {
//!   "machines": [{
//!     "name": "StateMachine",
//!     "defaultRetryPolicy": { "maxAttempts": 5, "initialRetryIntervalSeconds": 1,
//!                             "backoffCoefficient": 2.0, "maxRetryIntervalSeconds": 10,
//!                             "retryTimeoutSeconds": 60 },
//!     "transitions": [{ "name": "foo" }, { "name": "bar" }, { "name": "baz" }]
//!   }]
//! }
//! ```

#![deny(missing_docs)]

mod schema_types;

pub mod retry;
pub mod validation;

pub use retry::resolve_retry_policy;
pub use schema_types::{
    MachineDefinition, RetryPolicyDefinition, SchemaDefinition, TransitionDefinition,
};
pub use validation::{MachineError, validate_transition_names, validate_transitions};

/// Version of the machine description format.
pub const DSL_VERSION: &str = "1.0.0";

/// Parse a machine description from JSON text.
pub fn parse_schema(json: &str) -> Result<SchemaDefinition, serde_json::Error> {
    serde_json::from_str(json)
}

/// JSON Schema of the machine description format, stamped with
/// `x-dsl-version`.
pub fn generate_schema() -> schemars::schema::RootSchema {
    let mut schema = schemars::schema_for!(SchemaDefinition);
    schema.schema.extensions.insert(
        "x-dsl-version".to_string(),
        serde_json::Value::String(DSL_VERSION.to_string()),
    );
    schema
}

/// JSON Schema of the machine description format, pretty-printed.
pub fn generate_schema_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&generate_schema())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE_MACHINE: &str = r#"{
        "machines": [{
            "name": "StateMachine",
            "defaultRetryPolicy": {
                "maxAttempts": 5,
                "initialRetryIntervalSeconds": 1,
                "backoffCoefficient": 2.0,
                "maxRetryIntervalSeconds": 10,
                "retryTimeoutSeconds": 60
            },
            "transitions": [{ "name": "foo" }, { "name": "bar" }, { "name": "baz" }]
        }]
    }"#;

    #[test]
    fn test_parse_schema() {
        let schema = parse_schema(STATE_MACHINE).unwrap();
        assert_eq!(schema.machines.len(), 1);

        let machine = &schema.machines[0];
        assert_eq!(machine.name, "StateMachine");
        assert_eq!(machine.payload_path(), "super::StateMachine");
        let names: Vec<_> = machine.transitions.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["foo", "bar", "baz"]);

        let policy = machine.default_retry_policy.unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_retry_interval().as_secs(), 1);
        assert_eq!(policy.backoff_coefficient, 2.0);
        assert_eq!(policy.max_retry_interval().as_secs(), 10);
        assert_eq!(policy.retry_timeout().as_secs(), 60);
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let json = r#"{"machines": [{"name": "M", "transitions": [{"name": "a", "retries": 3}]}]}"#;
        assert!(parse_schema(json).is_err());
    }

    #[test]
    fn test_partial_policy_defaults_to_zero() {
        let json = r#"{"machines": [{"name": "M", "transitions": [
            {"name": "a", "retryPolicy": {"maxAttempts": 3}}
        ]}]}"#;
        let schema = parse_schema(json).unwrap();
        let policy = schema.machines[0].transitions[0].retry_policy.unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_coefficient, 0.0);
        assert_eq!(policy.retry_timeout_seconds, 0);
    }

    #[test]
    fn test_custom_payload_path() {
        let json = r#"{"machines": [{"name": "M", "payload": "crate::types::Order",
            "transitions": [{"name": "a"}]}]}"#;
        let schema = parse_schema(json).unwrap();
        assert_eq!(schema.machines[0].payload_path(), "crate::types::Order");
    }

    #[test]
    fn test_generate_schema() {
        let json = generate_schema_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["title"], "SchemaDefinition");
        assert_eq!(value["x-dsl-version"], DSL_VERSION);
        let definitions = value["definitions"].as_object().unwrap();
        assert!(definitions.contains_key("MachineDefinition"));
        assert!(definitions.contains_key("TransitionDefinition"));
        assert!(definitions.contains_key("RetryPolicyDefinition"));

        let machine = &definitions["MachineDefinition"]["properties"];
        assert!(machine.get("defaultRetryPolicy").is_some());
        assert!(machine.get("transitions").is_some());
    }
}
