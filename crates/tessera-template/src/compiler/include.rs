/*
 * include.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::path::PathBuf;

use tracing::debug;

use super::Compilation;
use crate::error::{TemplateError, TemplateResult};
use crate::fs::TemplateFs;
use crate::scan::{Form, find_directive, indent_lines, removal_span};

/// Whether a missing include target is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// `@include`: a missing file is skipped.
    Optional,
    /// `@required`: a missing file fails the compile.
    Required,
}

impl Requirement {
    pub fn directive(self) -> &'static str {
        match self {
            Requirement::Optional => "include",
            Requirement::Required => "required",
        }
    }
}

impl<F: TemplateFs> Compilation<'_, F> {
    /// Inline every include of the given kind, compiled and reindented.
    pub(crate) fn compile_includes(
        &mut self,
        node: usize,
        text: &str,
        requirement: Requirement,
    ) -> TemplateResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        while let Some(d) = find_directive(text, requirement.directive(), Form::Call, cursor)? {
            let name = self.evaluate_name(d.args());
            let included = match self.resolve(&name) {
                Some(path) => Some(self.compile_file(node, &path)?),
                None if requirement == Requirement::Required => {
                    return Err(TemplateError::MissingRequiredDependency {
                        path: PathBuf::from(name),
                    });
                }
                None => {
                    debug!(template = %name, "optional include not found; skipping");
                    None
                }
            };

            let content = included
                .as_deref()
                .map(|c| c.strip_suffix('\n').unwrap_or(c))
                .map(|c| c.strip_suffix('\r').unwrap_or(c))
                .unwrap_or("");

            let (start, end, replacement) = if content.is_empty() {
                let (start, end) = removal_span(text, d.start, d.end);
                (start, end, String::new())
            } else {
                (d.start, d.end, indent_lines(content, d.indent))
            };

            out.push_str(&text[cursor..start.max(cursor)]);
            out.push_str(&replacement);
            cursor = end;
        }

        out.push_str(&text[cursor..]);
        Ok(out)
    }
}
