// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compilation errors.

use std::io;
use std::path::PathBuf;

use statechain_dsl::MachineError;
use thiserror::Error;

/// Reasons a machine description cannot be turned into code.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The transition list is structurally invalid.
    #[error("invalid machine '{machine}': {source}")]
    InvalidMachine {
        /// Machine name.
        machine: String,
        /// What is wrong with the transitions.
        #[source]
        source: MachineError,
    },

    /// Two transitions convert to the same method name.
    #[error(
        "machine '{machine}': transitions '{first}' and '{second}' both map to method '{method}'"
    )]
    NamingCollision {
        /// Machine name.
        machine: String,
        /// Earlier transition.
        first: String,
        /// Later transition.
        second: String,
        /// The shared method name.
        method: String,
    },

    /// A name cannot be turned into a Rust identifier.
    #[error("machine '{machine}': '{name}' is not a valid identifier: {reason}")]
    InvalidIdentifier {
        /// Machine name.
        machine: String,
        /// Offending machine or transition name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A payload or runtime crate path is not a plain Rust path.
    #[error("machine '{machine}': '{path}' is not a valid Rust path")]
    InvalidPath {
        /// Machine name.
        machine: String,
        /// Offending path.
        path: String,
    },

    /// Two machines would produce the same module.
    #[error("machine '{name}' is defined more than once")]
    DuplicateMachine {
        /// Machine name.
        name: String,
    },

    /// Reading a schema or writing output failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The schema file is not a valid machine description.
    #[error("failed to parse machine description: {0}")]
    Parse(#[from] serde_json::Error),
}

impl CompileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
