/*
 * compile.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Compile command implementation
 */

//! Compile command implementation.
//!
//! Compiles a template to its artifact text. With a cache directory the
//! artifact and its dependency manifest are persisted as well, unless
//! `--no-cache` is given.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tessera_template::CompileOptions;
use tracing::info;

use super::EngineArgs;

/// Arguments for the compile command
#[derive(Debug)]
pub struct CompileArgs {
    pub template: String,
    pub engine: EngineArgs,
    pub no_cache: bool,
    /// Output file; stdout when absent
    pub output: Option<String>,
}

/// Execute the compile command
pub fn execute(args: CompileArgs) -> Result<()> {
    let engine = args.engine.engine()?;
    let options = CompileOptions {
        cache: !args.no_cache,
        ..CompileOptions::default()
    };

    let compiled = engine
        .compile(&args.template, &options)
        .with_context(|| format!("Failed to compile {}", args.template))?
        .unwrap_or_default();

    match &args.output {
        Some(output) => {
            let path = PathBuf::from(output);
            std::fs::write(&path, &compiled)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", compiled),
    }
    Ok(())
}
