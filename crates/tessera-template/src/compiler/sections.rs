/*
 * sections.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Section capture: `@yieldDefault(name) ... @show` and
//! `@section(name) ... @stop`.

use hashlink::LinkedHashMap;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::scan::{
    Directive, Form, find_closer, find_directive, left_flush, removal_span, strip_quotes,
};

/// Closing directive of a block started by `opening`.
fn block_end<'t>(
    text: &'t str,
    opening: &Directive<'t>,
    opener: &str,
    closer: &str,
) -> TemplateResult<Directive<'t>> {
    find_closer(text, closer, opening.end).ok_or_else(|| {
        TemplateError::syntax(format!(
            "@{}({}) is never closed with @{}",
            opener,
            opening.args(),
            closer
        ))
    })
}

/// Capture default content and leave a `@yield` in its place.
pub fn compile_yield_defaults(
    text: &str,
    sections: &mut LinkedHashMap<String, String>,
    tab_width: usize,
) -> TemplateResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(open) = find_directive(text, "yieldDefault", Form::Call, cursor)? {
        let show = block_end(text, &open, "yieldDefault", "show")?;
        let name = strip_quotes(open.args()).to_string();
        let content = left_flush(&text[open.end..show.at], tab_width);
        debug!(section = %name, bytes = content.len(), "captured default section");

        out.push_str(&text[cursor..open.start]);
        out.push_str(&format!("{}@yield('{}')", open.indent, name));
        sections.insert(name, content);
        cursor = show.end;
    }

    out.push_str(&text[cursor..]);
    Ok(out)
}

/// Capture sections and remove them from the output.
pub fn compile_sections(
    text: &str,
    sections: &mut LinkedHashMap<String, String>,
    tab_width: usize,
) -> TemplateResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(open) = find_directive(text, "section", Form::Call, cursor)? {
        let stop = block_end(text, &open, "section", "stop")?;
        if let Some(inner) = find_directive(text, "section", Form::Call, open.end)? {
            if inner.at < stop.at {
                return Err(TemplateError::NestedSection {
                    name: strip_quotes(inner.args()).to_string(),
                });
            }
        }

        let name = strip_quotes(open.args()).to_string();
        let content = left_flush(&text[open.end..stop.at], tab_width);
        debug!(section = %name, bytes = content.len(), "captured section");
        sections.insert(name, content);

        let (start, end) = removal_span(text, open.start, stop.end);
        out.push_str(&text[cursor..start.max(cursor)]);
        cursor = end;
    }

    out.push_str(&text[cursor..]);
    Ok(out)
}
