/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The render boundary.
//!
//! Script failures never escape a render call. Output is buffered while the
//! artifact runs; on failure the buffer is dropped and a notice is returned
//! in its place: a one-line message in production, or a report with the
//! error kind, location and construct trace in debug mode.

use std::path::Path;

use tracing::error;

use crate::context::TemplateContext;
use crate::error::{TemplateError, TemplateResult};
use crate::script::builtins::nl2br;
use crate::script::{ExecOptions, Script};

const RULE_WIDTH: usize = 60;

/// Options for [`Template::render`](crate::Template::render).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Execute the persisted artifact, recompiling it when stale. Without a
    /// cache directory rendering always compiles in memory.
    pub use_cache: bool,
    /// Report failures in detail instead of with a generic notice.
    pub debug: bool,
    /// Undefined variables are failures.
    pub strict: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            debug: false,
            strict: false,
        }
    }
}

/// Generic message emitted when a template fails to render.
pub fn failure_notice(name: &str) -> String {
    format!("Oops, something went wrong rendering template: {}<br>\n", name)
}

/// Detailed failure report, with line breaks converted to `<br />`.
pub fn debug_report(name: &str, file: &Path, err: &TemplateError) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let (message, line, trace) = match err {
        TemplateError::Evaluation {
            message,
            line,
            trace,
        } => (message.clone(), *line, trace.as_slice()),
        other => (other.to_string(), 0, &[][..]),
    };

    let mut report = format!(
        "Oops, Something went wrong rendering template: {}!\n{}\n{} : {} in file: {} (Line {})\n{}\nTrace: \n",
        name,
        rule,
        err.kind(),
        message,
        file.display(),
        line,
        rule
    );
    for (i, frame) in trace.iter().enumerate() {
        report.push_str(&format!("#{} {}\n", i, frame));
    }
    nl2br(&report)
}

/// Execute a parsed artifact, replacing any failure with a notice.
///
/// `script` is the result of parsing the artifact; a parse failure is
/// reported the same way as an execution failure.
pub fn execute_guarded(
    name: &str,
    file: &Path,
    script: TemplateResult<Script>,
    context: &TemplateContext,
    options: ExecOptions,
    debug: bool,
) -> String {
    let result = script.and_then(|script| {
        let mut buffer = String::new();
        script.execute(context, options, &mut buffer).map(|()| buffer)
    });

    match result {
        Ok(output) => output,
        Err(err) => {
            error!(
                template = name,
                file = %file.display(),
                kind = err.kind(),
                error = %err,
                "template failed to render"
            );
            if debug {
                debug_report(name, file, &err)
            } else {
                failure_notice(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(source: &str, debug: bool) -> String {
        execute_guarded(
            "page.html",
            Path::new("/cache/page"),
            Script::parse(source),
            &TemplateContext::new(),
            ExecOptions::default(),
            debug,
        )
    }

    #[test]
    fn test_success_passes_output_through() {
        assert_eq!(run("a<?= 1 + 1 ?>", false), "a2");
    }

    #[test]
    fn test_partial_output_is_discarded() {
        assert_eq!(
            run("before <?= 1 / 0 ?> after", false),
            "Oops, something went wrong rendering template: page.html<br>\n"
        );
    }

    #[test]
    fn test_debug_report() {
        let out = run("<?tpl if(true): ?>\n<?= nope(1) ?>\n<?tpl endif; ?>\n", true);
        let rule = "=".repeat(60);
        assert_eq!(
            out,
            format!(
                "Oops, Something went wrong rendering template: page.html!<br />\n{rule}<br />\nRenderExecutionFailure : unknown function 'nope' in file: /cache/page (Line 2)<br />\n{rule}<br />\nTrace: <br />\n#0 if at line 1<br />\n"
            )
        );
    }

    #[test]
    fn test_parse_failure_is_reported() {
        let out = run("<?tpl endif; ?>", true);
        assert!(out.contains("SyntaxError : Syntax error:"));
        assert!(out.contains("(Line 0)"));
    }
}
