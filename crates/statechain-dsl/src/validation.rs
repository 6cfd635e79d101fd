// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structural validation of transition lists.

use std::collections::HashSet;

use thiserror::Error;

use crate::TransitionDefinition;

/// A machine whose transition list cannot be compiled into a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// The machine has no transitions, so there is no entrypoint.
    #[error("machine has no transitions")]
    NoTransitions,

    /// A transition has an empty name.
    #[error("transition #{index} has an empty name")]
    EmptyTransitionName {
        /// Zero-based position of the transition.
        index: usize,
    },

    /// Two transitions share a name.
    #[error("duplicate transition name '{name}'")]
    DuplicateTransitionName {
        /// The repeated name.
        name: String,
    },
}

/// Check an ordered list of transition names.
///
/// Fails on an empty list, an empty name, or a repeated name. The first
/// problem in list order is reported.
pub fn validate_transition_names<'a, I>(names: I) -> Result<(), MachineError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for (index, name) in names.into_iter().enumerate() {
        if name.is_empty() {
            return Err(MachineError::EmptyTransitionName { index });
        }
        if !seen.insert(name) {
            return Err(MachineError::DuplicateTransitionName {
                name: name.to_string(),
            });
        }
    }

    if seen.is_empty() {
        return Err(MachineError::NoTransitions);
    }
    Ok(())
}

/// Check a machine's transitions.
pub fn validate_transitions(transitions: &[TransitionDefinition]) -> Result<(), MachineError> {
    validate_transition_names(transitions.iter().map(|t| t.name.as_str()))
}
