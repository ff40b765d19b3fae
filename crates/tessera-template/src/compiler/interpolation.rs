/*
 * interpolation.rs
 * Copyright (c) 2025 Posit, PBC
 */

use regex::{Captures, Regex};

use crate::error::{TemplateError, TemplateResult};
use crate::tags::{InterpolationKind, TagConfig};

/// Compile statement, escaped and raw interpolation tags.
pub fn compile_interpolations(text: &str, tags: &TagConfig) -> TemplateResult<String> {
    let mut out = text.to_string();
    for kind in tags.interpolation_order() {
        out = compile_kind(&out, tags, kind)?;
    }
    Ok(out)
}

fn compile_kind(text: &str, tags: &TagConfig, kind: InterpolationKind) -> TemplateResult<String> {
    let pair = tags.pair(kind);
    // Statements may be empty; echoes need an expression.
    let body = match kind {
        InterpolationKind::Statement => "(.*?)",
        InterpolationKind::Escaped | InterpolationKind::Content => "(.+?)",
    };
    let pattern = format!(
        r"(?s){}\s*{}\s*{}",
        regex::escape(&pair.open),
        body,
        regex::escape(&pair.close)
    );
    let re = Regex::new(&pattern).map_err(|e| TemplateError::Config {
        message: format!("invalid interpolation tags: {}", e),
    })?;

    let compiled = re.replace_all(text, |caps: &Captures| {
        let inner = &caps[1];
        match kind {
            InterpolationKind::Statement => format!("<?tpl {} ?>", inner),
            InterpolationKind::Escaped => format!("<?= escape({}) ?>", inner),
            InterpolationKind::Content => format!("<?= {} ?>", inner),
        }
    });
    Ok(compiled.into_owned())
}
