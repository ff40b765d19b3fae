/*
 * comments.rs
 * Copyright (c) 2025 Posit, PBC
 */

use regex::Regex;

use crate::error::{TemplateError, TemplateResult};
use crate::scan::removal_span;
use crate::tags::TagPair;

/// Remove comment blocks.
///
/// A comment alone on its line takes the line break with it.
pub fn compile_comments(text: &str, tags: &TagPair) -> TemplateResult<String> {
    let pattern = format!(
        r"(?s){}.*?{}",
        regex::escape(&tags.open),
        regex::escape(&tags.close)
    );
    let re = Regex::new(&pattern).map_err(|e| TemplateError::Config {
        message: format!("invalid comment tags: {}", e),
    })?;

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for found in re.find_iter(text) {
        let (start, end) = removal_span(text, found.start(), found.end());
        out.push_str(&text[cursor..start.max(cursor)]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(text: &str) -> String {
        compile_comments(text, &TagPair::new("{*", "*}")).unwrap()
    }

    #[test]
    fn test_standalone_comment_removes_line() {
        assert_eq!(compile("a\n  {* note *}\nb\n"), "a\nb\n");
    }

    #[test]
    fn test_inline_comment_keeps_surroundings() {
        assert_eq!(compile("a {* note *} b\n"), "a  b\n");
    }

    #[test]
    fn test_multiline_comment() {
        assert_eq!(compile("a\n{* one\ntwo\n*}\nb"), "a\nb");
    }

    #[test]
    fn test_custom_tags() {
        let out = compile_comments("x<# y #>z", &TagPair::new("<#", "#>")).unwrap();
        assert_eq!(out, "xz");
    }
}
