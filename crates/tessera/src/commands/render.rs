/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render command implementation
 */

//! Render command implementation.
//!
//! Data comes from an optional JSON file, with `--set KEY=VALUE` entries
//! layered on top. Dotted keys (`site.title=Blog`) write into nested
//! objects.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tessera_template::{RenderOptions, TemplateContext};
use tracing::debug;

use super::EngineArgs;

/// Arguments for the render command
#[derive(Debug)]
pub struct RenderArgs {
    pub template: String,
    pub engine: EngineArgs,
    /// JSON data file
    pub data: Option<String>,
    /// KEY=VALUE assignments
    pub set: Vec<String>,
    pub uncached: bool,
    pub debug: bool,
    pub strict: bool,
}

/// Execute the render command
pub fn execute(args: RenderArgs) -> Result<()> {
    let engine = args.engine.engine()?;
    let context = build_context(args.data.as_deref().map(Path::new), &args.set)?;
    let options = RenderOptions {
        use_cache: !args.uncached,
        debug: args.debug,
        strict: args.strict,
    };

    debug!("Rendering: {}", args.template);
    let output = engine
        .render(&args.template, &context, &options)
        .with_context(|| format!("Failed to render {}", args.template))?;
    print!("{}", output);
    Ok(())
}

/// Combine the data file and `--set` assignments into a render context.
fn build_context(data: Option<&Path>, assignments: &[String]) -> Result<TemplateContext> {
    let mut root = match data {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read data file {}", path.display()))?;
            match serde_json::from_str::<Value>(&text)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?
            {
                Value::Object(map) => map,
                _ => anyhow::bail!("Data file {} must contain a JSON object", path.display()),
            }
        }
        None => Map::new(),
    };

    for assignment in assignments {
        let (key, value) = parse_assignment(assignment)?;
        insert_dotted(&mut root, &key, value);
    }

    Ok(TemplateContext::from_json(Value::Object(root))?)
}

/// Split `KEY=VALUE`; the value is JSON when it parses, otherwise a string.
fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected KEY=VALUE, got '{}'", assignment))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Empty key in '{}'", assignment);
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn insert_dotted(root: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            root.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_dotted(map, rest, value);
            }
        }
    }
}
