/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Executable artifact representation.
//!
//! The directive compiler produces text in which literal passthrough is
//! interleaved with three kinds of blocks:
//!
//! - `<?= expr ?>` writes the value of `expr`
//! - `<?tpl stmt ?>` runs a statement or opens/closes a control construct
//! - `<?# text ?>` is a comment
//!
//! A code or comment block directly followed by a line break consumes that
//! line break, so a directive alone on its line leaves no blank line behind.
//!
//! [`Script::parse`] turns the text into a node tree once; the tree can then
//! be executed any number of times.
//!
//! # Example
//!
//! ```
//! use tessera_template::{Script, TemplateContext};
//!
//! let script = Script::parse("<?tpl foreach(items as item): ?>\n- <?= upper(item) ?>\n<?tpl endforeach; ?>\n").unwrap();
//! let mut data = TemplateContext::new();
//! data.insert("items", vec!["a", "b"]);
//! assert_eq!(script.render(&data, Default::default()).unwrap(), "- A\n- B\n");
//! ```

pub mod ast;
pub mod builtins;
pub mod evaluator;
pub mod expr;
pub mod parser;

use crate::context::{TemplateContext, TemplateValue};
use crate::error::TemplateResult;
pub use evaluator::{Evaluator, ExecOptions};

/// A parsed compiled artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    nodes: Vec<ast::ScriptNode>,
}

impl Script {
    /// Parse artifact text.
    pub fn parse(source: &str) -> TemplateResult<Self> {
        Ok(Self {
            nodes: parser::parse(source)?,
        })
    }

    pub fn nodes(&self) -> &[ast::ScriptNode] {
        &self.nodes
    }

    /// Execute against `context`, appending output to `out`.
    ///
    /// On error `out` holds whatever was produced before the failure; callers
    /// that must not leak partial output discard it.
    pub fn execute(
        &self,
        context: &TemplateContext,
        options: ExecOptions,
        out: &mut String,
    ) -> TemplateResult<()> {
        let mut evaluator = Evaluator::new(context.clone(), options);
        evaluator.run(&self.nodes, out)
    }

    /// Execute and return the output.
    pub fn render(&self, context: &TemplateContext, options: ExecOptions) -> TemplateResult<String> {
        let mut out = String::new();
        self.execute(context, options, &mut out)?;
        Ok(out)
    }
}

/// Evaluate a standalone expression, as used for include and extends paths.
pub fn evaluate_expression(source: &str, context: &TemplateContext) -> TemplateResult<TemplateValue> {
    let expr = expr::parse_expression(source)?;
    Evaluator::new(context.clone(), ExecOptions::default()).eval(&expr, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn render(source: &str, data: serde_json::Value) -> String {
        let context = TemplateContext::from_json(data).unwrap();
        Script::parse(source)
            .unwrap()
            .render(&context, ExecOptions::default())
            .unwrap()
    }

    #[test]
    fn test_literal_passthrough() {
        assert_eq!(render("plain <b>text</b>\n", json!({})), "plain <b>text</b>\n");
    }

    #[test]
    fn test_conditional_chain() {
        let source = "<?tpl if(n > 10): ?>\nbig\n<?tpl elseif(n > 5): ?>\nmedium\n<?tpl else: ?>\nsmall\n<?tpl endif; ?>\n";
        assert_eq!(render(source, json!({"n": 20})), "big\n");
        assert_eq!(render(source, json!({"n": 7})), "medium\n");
        assert_eq!(render(source, json!({"n": 1})), "small\n");
    }

    #[test]
    fn test_foreach_over_map_with_keys() {
        let source = "<?tpl foreach($prices as $item => $price): ?><?= item ?>=<?= price ?>;<?tpl endforeach; ?>";
        assert_eq!(
            render(source, json!({"prices": {"apple": 1.5, "pear": 2}})),
            "apple=1.5;pear=2;"
        );
    }

    #[test]
    fn test_for_and_assignments() {
        let source = "<?tpl total = 0 ?>\n<?tpl for($i = 1; $i <= 4; $i++): ?>\n<?tpl total += i ?>\n<?tpl endfor; ?>\n<?= total ?>";
        assert_eq!(render(source, json!({})), "10");
    }

    #[test]
    fn test_while_loop_limit() {
        let script = Script::parse("<?tpl while(true): ?>x<?tpl endwhile; ?>").unwrap();
        let options = ExecOptions {
            max_loop_iterations: 3,
            ..ExecOptions::default()
        };
        let mut out = String::new();
        let err = script
            .execute(&TemplateContext::new(), options, &mut out)
            .unwrap_err();
        assert_eq!(out, "xxx");
        match err {
            TemplateError::Evaluation { line, trace, .. } => {
                assert_eq!(line, 1);
                assert_eq!(trace, vec!["while at line 1".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_trace_lists_enclosing_constructs() {
        let source = "<?tpl foreach(rows as row): ?>\n<?tpl if(row): ?>\n<?= 1 / 0 ?>\n<?tpl endif; ?>\n<?tpl endforeach; ?>\n";
        let script = Script::parse(source).unwrap();
        let context = TemplateContext::from_json(json!({"rows": [1]})).unwrap();
        match script.render(&context, ExecOptions::default()).unwrap_err() {
            TemplateError::Evaluation { line, trace, .. } => {
                assert_eq!(line, 3);
                assert_eq!(trace, vec!["if at line 2", "foreach at line 1"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_comment_block_swallows_newline() {
        assert_eq!(render("a\n<?# note ?>\nb", json!({})), "a\nb");
    }

    #[test]
    fn test_evaluate_expression() {
        let mut constants = TemplateContext::new();
        constants.insert("pages", "/srv/pages");
        assert_eq!(
            evaluate_expression("pages ~ '/nav.html'", &constants).unwrap(),
            TemplateValue::from("/srv/pages/nav.html")
        );
    }
}
