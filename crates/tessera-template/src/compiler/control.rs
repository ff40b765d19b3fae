/*
 * control.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Control-flow directives.
//!
//! Each directive becomes a `<?tpl ... ?>` code block. When the directive is
//! alone on its line the block replaces the whole line except the line
//! break, which the block then consumes at render time.

use crate::error::TemplateResult;
use crate::scan::{Form, code_span, rewrite};

const OPENINGS: [&str; 5] = ["if", "elseif", "foreach", "for", "while"];
const CLOSINGS: [&str; 4] = ["endif", "endforeach", "endfor", "endwhile"];

fn compile_directive<C>(text: &str, name: &str, form: Form, code: C) -> TemplateResult<String>
where
    C: Fn(&str) -> String,
{
    rewrite(text, name, form, |text, d| {
        let (start, end) = code_span(text, d.at, d.end);
        Ok((start, end, code(d.args())))
    })
}

/// `@if(cond)` and friends, arguments kept byte for byte.
pub fn compile_openings(text: &str) -> TemplateResult<String> {
    OPENINGS.iter().try_fold(text.to_string(), |acc, name| {
        compile_directive(&acc, name, Form::Call, |args| {
            format!("<?tpl {}({}): ?>", name, args)
        })
    })
}

pub fn compile_closings(text: &str) -> TemplateResult<String> {
    CLOSINGS.iter().try_fold(text.to_string(), |acc, name| {
        compile_directive(&acc, name, Form::Bare, |_| format!("<?tpl {}; ?>", name))
    })
}

pub fn compile_else(text: &str) -> TemplateResult<String> {
    compile_directive(text, "else", Form::Bare, |_| "<?tpl else: ?>".to_string())
}

/// `@unless(cond)` opens an `if` on the negated condition.
pub fn compile_unless(text: &str) -> TemplateResult<String> {
    compile_directive(text, "unless", Form::Call, |args| {
        format!("<?tpl if(!({})): ?>", args)
    })
}

pub fn compile_end_unless(text: &str) -> TemplateResult<String> {
    compile_directive(text, "endunless", Form::Bare, |_| {
        "<?tpl endif; ?>".to_string()
    })
}
