/*
 * yields.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `@yield(name)` resolution.
//!
//! In the top-level template (one that extends nothing) every yield site is
//! replaced by the resolved section content, with nested yields inside that
//! content expanded as well; a section nobody defines is dropped. A template
//! that extends another only rewrites yields inside its own captured
//! sections, leaving unresolved sites for the ancestor to handle.

use tracing::{debug, warn};

use crate::error::TemplateResult;
use crate::inheritance::{ChainNode, resolve_section};
use crate::scan::{Form, find_directive, indent_lines, removal_span, rewrite, strip_quotes};

pub fn compile_yields(text: &str, chain: &mut [ChainNode], current: usize) -> TemplateResult<String> {
    let top_level = find_directive(text, "extends", Form::Call, 0)?.is_none();
    if top_level {
        let mut visiting = Vec::new();
        return expand_yields(text, chain, current, &mut visiting);
    }

    let names: Vec<String> = chain[current].sections.keys().cloned().collect();
    for name in names {
        let Some(content) = chain[current].sections.get(&name).cloned() else {
            continue;
        };
        let resolved = rewrite(&content, "yield", Form::Call, |content, d| {
            let target = strip_quotes(d.args());
            let replacement = match resolve_section(chain, current, target) {
                Some(found) => indent_lines(&found, d.indent),
                None => content[d.start..d.end].to_string(),
            };
            Ok((d.start, d.end, replacement))
        })?;
        if let Some(slot) = chain[current].sections.get_mut(&name) {
            *slot = resolved;
        }
    }
    Ok(text.to_string())
}

fn expand_yields(
    text: &str,
    chain: &[ChainNode],
    current: usize,
    visiting: &mut Vec<String>,
) -> TemplateResult<String> {
    rewrite(text, "yield", Form::Call, |text, d| {
        let name = strip_quotes(d.args()).to_string();
        let content = if visiting.contains(&name) {
            warn!(section = %name, "section yields itself; emitting nothing");
            None
        } else {
            match resolve_section(chain, current, &name) {
                Some(found) => {
                    visiting.push(name.clone());
                    let expanded = expand_yields(&found, chain, current, visiting);
                    visiting.pop();
                    Some(expanded?)
                }
                None => None,
            }
        };

        match content {
            Some(content) if !content.is_empty() => {
                debug!(section = %name, "resolved yield");
                Ok((d.start, d.end, indent_lines(&content, d.indent)))
            }
            _ => {
                debug!(section = %name, "yield has no content; removing");
                let (start, end) = removal_span(text, d.start, d.end);
                Ok((start, end, String::new()))
            }
        }
    })
}
