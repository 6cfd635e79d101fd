// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Effective retry policy per transition.

use crate::{MachineDefinition, RetryPolicyDefinition, TransitionDefinition};

/// Pick the policy a transition runs with.
///
/// The transition's own policy wins, then the machine default, then none.
/// Policies are never merged field by field.
pub fn resolve_retry_policy<'a>(
    transition: &'a TransitionDefinition,
    default: Option<&'a RetryPolicyDefinition>,
) -> Option<&'a RetryPolicyDefinition> {
    transition.retry_policy.as_ref().or(default)
}

impl MachineDefinition {
    /// Effective policy of every transition, in order.
    pub fn resolved_retry_policies(&self) -> Vec<Option<&RetryPolicyDefinition>> {
        self.transitions
            .iter()
            .map(|t| resolve_retry_policy(t, self.default_retry_policy.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicyDefinition {
        RetryPolicyDefinition {
            max_attempts,
            initial_retry_interval_seconds: 1,
            backoff_coefficient: 2.0,
            max_retry_interval_seconds: 10,
            retry_timeout_seconds: 60,
        }
    }

    #[test]
    fn test_no_policy_anywhere() {
        let transition = TransitionDefinition::new("foo");
        assert_eq!(resolve_retry_policy(&transition, None), None);
    }

    #[test]
    fn test_default_applies() {
        let default = policy(5);
        let transition = TransitionDefinition::new("foo");
        assert_eq!(resolve_retry_policy(&transition, Some(&default)), Some(&default));
    }

    #[test]
    fn test_override_wins_without_merging() {
        let default = policy(5);
        let override_policy = RetryPolicyDefinition {
            max_attempts: 2,
            ..Default::default()
        };
        let transition = TransitionDefinition::new("foo").with_retry_policy(override_policy);

        let resolved = resolve_retry_policy(&transition, Some(&default)).unwrap();
        assert_eq!(resolved.max_attempts, 2);
        // Unset fields are not filled in from the default
        assert_eq!(resolved.initial_retry_interval_seconds, 0);
        assert_eq!(resolved.retry_timeout_seconds, 0);
    }

    #[test]
    fn test_override_without_default() {
        let transition = TransitionDefinition::new("foo").with_retry_policy(policy(3));
        assert_eq!(
            resolve_retry_policy(&transition, None).map(|p| p.max_attempts),
            Some(3)
        );
    }

    #[test]
    fn test_machine_resolution_order() {
        let machine = MachineDefinition {
            name: "StateMachine".to_string(),
            payload: None,
            default_retry_policy: Some(policy(5)),
            transitions: vec![
                TransitionDefinition::new("foo"),
                TransitionDefinition::new("bar").with_retry_policy(policy(9)),
                TransitionDefinition::new("baz"),
            ],
        };

        let attempts: Vec<_> = machine
            .resolved_retry_policies()
            .into_iter()
            .map(|p| p.map(|p| p.max_attempts))
            .collect();
        assert_eq!(attempts, vec![Some(5), Some(9), Some(5)]);
    }
}
