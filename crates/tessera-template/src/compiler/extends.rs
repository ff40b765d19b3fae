/*
 * extends.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::path::PathBuf;

use tracing::debug;

use super::Compilation;
use crate::error::{TemplateError, TemplateResult};
use crate::fs::TemplateFs;
use crate::scan::{Form, find_directive};

impl<F: TemplateFs> Compilation<'_, F> {
    /// Replace the output with the compiled parent template.
    ///
    /// The parent becomes a new chain node whose child is `node`; once it is
    /// compiled its dependencies are folded into `node`'s.
    pub(crate) fn compile_extends(&mut self, node: usize, text: &str) -> TemplateResult<String> {
        let Some(directive) = find_directive(text, "extends", Form::Call, 0)? else {
            return Ok(text.to_string());
        };

        let name = self.evaluate_name(directive.args());
        let parent_path = self
            .resolve(&name)
            .ok_or_else(|| TemplateError::MissingRequiredDependency {
                path: PathBuf::from(&name),
            })?;
        debug!(
            child = %self.chain[node].source_path.display(),
            parent = %parent_path.display(),
            "extending template"
        );

        let parent = self.push_node(&parent_path, Some(node));
        let output = self.compile_file(parent, &parent_path)?;
        let inherited = self.chain[parent].dependencies.clone();
        self.chain[node].dependencies.merge_missing(&inherited);
        Ok(output)
    }
}
