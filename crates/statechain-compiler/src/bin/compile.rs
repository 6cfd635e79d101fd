// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! State machine compiler CLI
//!
//! Compiles a machine description into one Rust module per machine.
//!
//! Usage:
//!
//! ```text
//! statechain-compile --schema <path> [--out-dir <dir>] [--runtime-crate <path>] [--rustfmt]
//! statechain-compile --print-schema
//! ```
//!
//! Example:
//!
//! ```text
//! statechain-compile --schema machines/state_machine.json --out-dir src/generated --rustfmt
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use clap::Parser;
use statechain_compiler::{
    CompileOptions, DEFAULT_RUNTIME_CRATE, compile_schema, load_schema, write_generated_files,
};

#[derive(Debug, Parser)]
#[command(
    name = "statechain-compile",
    version,
    about = "Compile linear state machine descriptions into statechain workflow modules"
)]
struct Args {
    /// Path to the machine description JSON file
    #[arg(long, value_name = "PATH", required_unless_present = "print_schema")]
    schema: Option<PathBuf>,

    /// Directory the generated modules are written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Path of the workflow runtime crate as seen from generated code
    #[arg(long, value_name = "PATH", default_value = DEFAULT_RUNTIME_CRATE)]
    runtime_crate: String,

    /// Format written files with rustfmt (failures are reported as warnings)
    #[arg(long)]
    rustfmt: bool,

    /// Print the JSON Schema of the description format and exit
    #[arg(long)]
    print_schema: bool,
}

fn run_rustfmt(path: &Path) {
    match Command::new("rustfmt")
        .arg("--edition")
        .arg("2024")
        .arg(path)
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => {
            tracing::warn!(path = %path.display(), %status, "rustfmt failed, leaving file unformatted");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not run rustfmt");
        }
    }
}

fn main() -> ExitCode {
    // Initialize minimal logging (default to warn if RUST_LOG not set)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if args.print_schema {
        return match statechain_dsl::generate_schema_json() {
            Ok(schema) => {
                println!("{}", schema);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error generating schema: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let Some(schema_path) = args.schema else {
        eprintln!("Error: --schema is required");
        return ExitCode::FAILURE;
    };

    let schema = match load_schema(&schema_path) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = CompileOptions::default().with_runtime_crate(args.runtime_crate);
    let files = match compile_schema(&schema, &options) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Compilation failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let written = match write_generated_files(&files, &args.out_dir) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Error writing generated files: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for path in &written {
        if args.rustfmt {
            run_rustfmt(path);
        }
        // Print written paths to stdout for scripts to capture
        println!("{}", path.display());
    }

    ExitCode::SUCCESS
}
