// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};

use statechain_compiler::{CompileOptions, compile_schema, load_schema, write_generated_files};

const MACHINES: &str = "machines/state_machine.json";

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed={}", MACHINES);

    // Compile the machine description into $OUT_DIR/state_machine_state.rs
    let schema = load_schema(Path::new(MACHINES))?;
    let files = compile_schema(&schema, &CompileOptions::default())?;
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    write_generated_files(&files, &out_dir)?;

    Ok(())
}
