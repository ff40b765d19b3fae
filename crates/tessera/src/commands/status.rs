/*
 * status.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Status command implementation.

use anyhow::{Context, Result};
use tessera_template::CacheManager;

use super::EngineArgs;

/// Arguments for the status command
#[derive(Debug)]
pub struct StatusArgs {
    pub template: String,
    pub engine: EngineArgs,
}

/// Execute the status command
pub fn execute(args: StatusArgs) -> Result<()> {
    let engine = args.engine.engine()?;
    let source = engine
        .resolve_path(&args.template)
        .with_context(|| format!("Template not found: {}", args.template))?;
    let expired = engine.is_expired(&args.template)?;

    println!("{}: {}", source.display(), if expired { "expired" } else { "fresh" });
    match engine.artifact_path(&args.template)? {
        Some(artifact) => {
            println!("artifact: {}", artifact.display());
            println!("manifest: {}", CacheManager::manifest_path(&artifact).display());
        }
        None => println!("artifact: (no cache directory configured)"),
    }
    Ok(())
}
