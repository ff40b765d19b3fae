/*
 * scan.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive scanning helpers shared by the compiler passes.
//!
//! Directives are written `@name(args)` or bare `@name`. A directive is only
//! recognized when the `@` is not glued to a preceding word character, so
//! `user@include(...)` in prose is left alone. The blank run in front of the
//! `@` is captured as the directive's indent, which the include and yield
//! passes prepend to every line they inline.
//!
//! Arguments are matched with a depth counter rather than a regular
//! expression, so `@if(a && (b || c))` captures `a && (b || c)` exactly.
//! Parentheses inside quoted strings do not count.

use crate::error::{TemplateError, TemplateResult};
use crate::script::parser::{BLOCK_CLOSE, CODE_OPEN, COMMENT_OPEN};

/// How a directive carries its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `@name(args)`, optionally with blanks before the parenthesis.
    Call,
    /// `@name` not followed by a word character.
    Bare,
}

/// A directive occurrence located in a template string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'t> {
    /// Start of the captured indent (equal to `at` when there is none).
    pub start: usize,
    /// Byte offset of the `@`.
    pub at: usize,
    /// One past the closing parenthesis, or past the name for bare directives.
    pub end: usize,
    /// Blanks preceding the `@`.
    pub indent: &'t str,
    /// Text between the outer parentheses, for [`Form::Call`] directives.
    pub args: Option<&'t str>,
}

impl<'t> Directive<'t> {
    pub fn args(&self) -> &'t str {
        self.args.unwrap_or("")
    }
}

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Find the next `@name` directive at or after `from`.
///
/// Returns a syntax error when a call-form directive has no matching
/// closing parenthesis.
pub fn find_directive<'t>(
    text: &'t str,
    name: &str,
    form: Form,
    from: usize,
) -> TemplateResult<Option<Directive<'t>>> {
    let needle = format!("@{}", name);
    let mut pos = from;

    while let Some(rel) = text[pos..].find(&needle) {
        let at = pos + rel;
        let after = at + needle.len();
        pos = after;

        let run_start = from + text[from..at].trim_end_matches(is_blank).len();
        let glued = text[..run_start].chars().next_back().is_some_and(is_word_char);
        let start = match (glued, run_start == at) {
            (true, true) => continue,
            // The first blank separates the word from the directive.
            (true, false) => run_start + 1,
            (false, _) => run_start,
        };

        let directive = match form {
            Form::Bare => {
                if text[after..].chars().next().is_some_and(is_word_char) {
                    continue;
                }
                Directive {
                    start,
                    at,
                    end: after,
                    indent: &text[start..at],
                    args: None,
                }
            }
            Form::Call => {
                let open = after + (text[after..].len() - text[after..].trim_start_matches(is_blank).len());
                if !text[open..].starts_with('(') {
                    continue;
                }
                let close = matching_paren(text, open).ok_or_else(|| {
                    TemplateError::syntax(format!(
                        "unbalanced parentheses in @{} at byte {}",
                        name, at
                    ))
                })?;
                Directive {
                    start,
                    at,
                    end: close + 1,
                    indent: &text[start..at],
                    args: Some(&text[open + 1..close]),
                }
            }
        };
        return Ok(Some(directive));
    }

    Ok(None)
}

/// Find the next bare `@name` that closes a block.
///
/// Unlike [`find_directive`], a closer may follow text directly
/// (`Hello@stop`). It must still not run into a longer word.
pub fn find_closer<'t>(text: &'t str, name: &str, from: usize) -> Option<Directive<'t>> {
    let needle = format!("@{}", name);
    let mut pos = from;

    while let Some(rel) = text[pos..].find(&needle) {
        let at = pos + rel;
        let after = at + needle.len();
        pos = after;
        if text[after..].chars().next().is_some_and(is_word_char) {
            continue;
        }
        let start = from + text[from..at].trim_end_matches(is_blank).len();
        return Some(Directive {
            start,
            at,
            end: after,
            indent: &text[start..at],
            args: None,
        });
    }

    None
}

/// Collect every occurrence of a directive, in document order.
pub fn find_all<'t>(text: &'t str, name: &str, form: Form) -> TemplateResult<Vec<Directive<'t>>> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(d) = find_directive(text, name, form, from)? {
        from = d.end;
        found.push(d);
    }
    Ok(found)
}

/// Rewrite every occurrence of a directive, left to right.
///
/// `replace` receives the full text and the directive and returns the span
/// to overwrite (which must contain the directive) together with its
/// replacement. Scanning resumes after the replaced span, so replacement
/// text is never rescanned.
pub fn rewrite<'t, R>(text: &'t str, name: &str, form: Form, mut replace: R) -> TemplateResult<String>
where
    R: FnMut(&'t str, &Directive<'t>) -> TemplateResult<(usize, usize, String)>,
{
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(directive) = find_directive(text, name, form, cursor)? {
        let (start, end, replacement) = replace(text, &directive)?;
        let start = start.max(cursor);
        let end = end.max(directive.end);
        out.push_str(&text[cursor..start]);
        out.push_str(&replacement);
        cursor = end;
    }

    out.push_str(&text[cursor..]);
    Ok(out)
}

/// Index of the parenthesis closing the one at `open`.
///
/// Quoted strings (single or double, with backslash escapes) are skipped.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// The line holding `text[start..end]`, if nothing but blanks shares it.
///
/// Returns the offset of the line start and the offset of the terminating
/// `\n` (or the end of the text).
pub fn standalone_line(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    if !text[line_start..start].chars().all(is_blank) {
        return None;
    }
    let line_end = text[end..].find('\n').map_or(text.len(), |i| end + i);
    if !text[end..line_end].chars().all(|c| is_blank(c) || c == '\r') {
        return None;
    }
    Some((line_start, line_end))
}

/// Span to delete when removing `text[start..end]`.
///
/// A construct alone on its line takes the whole line with it, including
/// the line break; otherwise only the construct itself goes.
pub fn removal_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    match standalone_line(text, start, end) {
        Some((line_start, line_end)) => (line_start, (line_end + 1).min(text.len())),
        None => (start, end),
    }
}

/// Span to overwrite with a code block that swallows its own line break.
///
/// Like [`removal_span`] but the line break is kept for the code block to
/// consume.
pub fn code_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    standalone_line(text, start, end).unwrap_or((start, end))
}

/// Trim whitespace and surrounding quotes from a directive argument.
pub fn strip_quotes(arg: &str) -> &str {
    arg.trim().trim_matches(|c| c == '\'' || c == '"')
}

/// Whether `line` holds nothing but a single code or comment block.
///
/// Such lines produce no output and swallow their own line break, so
/// reindenting passes leave them where they are.
pub fn is_code_line(line: &str) -> bool {
    let line = line.trim();
    (line.starts_with(CODE_OPEN) || line.starts_with(COMMENT_OPEN))
        && line.ends_with(BLOCK_CLOSE)
        && line.matches(BLOCK_CLOSE).count() == 1
}

/// Normalize captured block content so its indentation starts at column 0.
///
/// Tabs are expanded to `tab_width` spaces, leading blank lines are dropped,
/// whitespace-only lines become empty, the smallest indent among the
/// remaining output lines is stripped from all of them and trailing
/// whitespace is trimmed. Lines holding only a code block do not count
/// toward the smallest indent.
pub fn left_flush(content: &str, tab_width: usize) -> String {
    let expanded = content.replace('\t', &" ".repeat(tab_width));
    let lines: Vec<&str> = expanded
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .skip_while(|line| line.trim().is_empty())
        .collect();

    let indent_of = |line: &str| line.len() - line.trim_start_matches(' ').len();
    let min_indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty() && !is_code_line(line))
        .map(|line| indent_of(*line))
        .min()
        .unwrap_or(0);

    let flushed: Vec<&str> = lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else if is_code_line(line) {
                &line[indent_of(*line).min(min_indent)..]
            } else {
                &line[min_indent..]
            }
        })
        .collect();

    flushed.join("\n").trim_end().to_string()
}

/// Prefix every non-empty line of `content` with `indent`.
///
/// Lines holding only a code block are not prefixed. `\r\n` line breaks
/// are normalized to `\n`.
pub fn indent_lines(content: &str, indent: &str) -> String {
    content
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .map(|line| {
            if line.is_empty() || is_code_line(line) {
                line.to_string()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_call_directive_with_nested_parens() {
        let text = "x @if(a && (b || c)) y";
        let d = find_directive(text, "if", Form::Call, 0).unwrap().unwrap();
        assert_eq!(d.args(), "a && (b || c)");
        assert_eq!(&text[d.start..d.end], "@if(a && (b || c))");
        assert_eq!(d.indent, "");
    }

    #[test]
    fn test_parens_inside_strings_are_ignored() {
        let text = "@include('a)b.html')";
        let d = find_directive(text, "include", Form::Call, 0).unwrap().unwrap();
        assert_eq!(d.args(), "'a)b.html'");
    }

    #[test]
    fn test_unbalanced_parens_is_syntax_error() {
        let err = find_directive("@if(a && (b)", "if", Form::Call, 0).unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn test_glued_directive_is_not_matched() {
        assert!(find_directive("mail@if(x)", "if", Form::Call, 0).unwrap().is_none());
        assert!(find_directive("@iffy(x)", "if", Form::Call, 0).unwrap().is_none());
        assert!(find_directive("@elseif(x)", "else", Form::Bare, 0).unwrap().is_none());
        assert!(find_directive("@foreach(x)", "for", Form::Call, 0).unwrap().is_none());
    }

    #[test]
    fn test_closer_may_follow_text() {
        let text = "Hello@stop @stopped";
        let d = find_closer(text, "stop", 0).unwrap();
        assert_eq!(d.at, 5);
        assert_eq!(d.indent, "");
        assert!(find_closer(text, "stop", d.end).is_none());
    }

    #[test]
    fn test_indent_after_word_drops_first_blank() {
        let text = "word   @yield('a')";
        let d = find_directive(text, "yield", Form::Call, 0).unwrap().unwrap();
        assert_eq!(d.indent, "  ");
    }

    #[test]
    fn test_indent_capture_at_line_start() {
        let text = "<div>\n    @include('nav')\n</div>";
        let d = find_directive(text, "include", Form::Call, 0).unwrap().unwrap();
        assert_eq!(d.indent, "    ");
        assert_eq!(strip_quotes(d.args()), "nav");
    }

    #[test]
    fn test_find_all_in_order() {
        let found = find_all("@endif @endif\n@endif", "endif", Form::Bare).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found[0].at < found[1].at && found[1].at < found[2].at);
    }

    #[test]
    fn test_removal_span_standalone_line() {
        let text = "a\n  {* c *}  \nb";
        let start = text.find("{*").unwrap();
        let end = text.find("*}").unwrap() + 2;
        let (s, e) = removal_span(text, start, end);
        assert_eq!(format!("{}{}", &text[..s], &text[e..]), "a\nb");
    }

    #[test]
    fn test_removal_span_inline() {
        let text = "a {* c *} b";
        let (s, e) = removal_span(text, 2, 9);
        assert_eq!((s, e), (2, 9));
    }

    #[test]
    fn test_left_flush() {
        let content = "\n    <h1>\n      Title\n\n    </h1>\n  ";
        assert_eq!(left_flush(content, 2), "<h1>\n  Title\n\n</h1>");
    }

    #[test]
    fn test_left_flush_single_line_and_tabs() {
        assert_eq!(left_flush(" Hello ", 2), "Hello");
        assert_eq!(left_flush("\n\t\ta\n\tb", 2), "  a\nb");
    }

    #[test]
    fn test_rewrite_does_not_rescan_replacements() {
        let out = rewrite("@x @x", "x", Form::Bare, |_, d| {
            Ok((d.at, d.end, "@x!".to_string()))
        })
        .unwrap();
        assert_eq!(out, "@x! @x!");
    }

    #[test]
    fn test_indent_lines() {
        assert_eq!(indent_lines("a\r\n\nb", "  "), "  a\n\n  b");
    }

    #[test]
    fn test_code_lines_are_not_reindented() {
        let content = "<ul>\n<?tpl foreach(xs as x): ?>\n  <li><?= x ?></li>\n<?tpl endforeach; ?>\n</ul>";
        assert_eq!(
            indent_lines(content, "  "),
            "  <ul>\n<?tpl foreach(xs as x): ?>\n    <li><?= x ?></li>\n<?tpl endforeach; ?>\n  </ul>"
        );
        assert_eq!(left_flush(&indent_lines(content, "    "), 2), content);
        assert!(!is_code_line("<?tpl if(a): ?>yes<?tpl endif; ?>"));
        assert!(!is_code_line("<?= x ?>"));
    }
}
