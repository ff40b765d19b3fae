/*
 * builtins.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Functions callable from artifact expressions.

use hashlink::LinkedHashMap;

use crate::context::TemplateValue;
use crate::error::{TemplateError, TemplateResult};

/// Call the builtin `name`.
///
/// `max_items` bounds the size of lists produced by `range`.
pub fn call(
    name: &str,
    args: Vec<TemplateValue>,
    max_items: usize,
    line: usize,
) -> TemplateResult<TemplateValue> {
    let arity = |min: usize, max: usize| -> TemplateResult<()> {
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            };
            return Err(TemplateError::evaluation(
                format!("{}() expects {} argument(s), got {}", name, expected, args.len()),
                line,
            ));
        }
        Ok(())
    };

    match name {
        "escape" | "e" => {
            arity(1, 1)?;
            Ok(TemplateValue::String(escape_html(&args[0].render())))
        }
        "upper" => {
            arity(1, 1)?;
            Ok(TemplateValue::String(args[0].render().to_uppercase()))
        }
        "lower" => {
            arity(1, 1)?;
            Ok(TemplateValue::String(args[0].render().to_lowercase()))
        }
        "trim" => {
            arity(1, 1)?;
            Ok(TemplateValue::String(args[0].render().trim().to_string()))
        }
        "nl2br" => {
            arity(1, 1)?;
            Ok(TemplateValue::String(nl2br(&args[0].render())))
        }
        "length" | "count" => {
            arity(1, 1)?;
            let n = match &args[0] {
                TemplateValue::Null => 0,
                TemplateValue::List(items) => items.len(),
                TemplateValue::Map(m) => m.len(),
                other => other.render().chars().count(),
            };
            Ok(TemplateValue::Number(n as f64))
        }
        "join" => {
            arity(1, 2)?;
            let separator = args.get(1).map(|s| s.render()).unwrap_or_default();
            let joined = match &args[0] {
                TemplateValue::List(items) => items
                    .iter()
                    .map(|v| v.render())
                    .collect::<Vec<_>>()
                    .join(&separator),
                other => other.render(),
            };
            Ok(TemplateValue::String(joined))
        }
        "default" => {
            arity(2, 2)?;
            let mut args = args;
            let fallback = args.pop().unwrap_or_default();
            let value = args.pop().unwrap_or_default();
            let missing = matches!(&value, TemplateValue::Null)
                || matches!(&value, TemplateValue::String(s) if s.is_empty());
            Ok(if missing { fallback } else { value })
        }
        "range" => {
            arity(2, 3)?;
            range(&args, max_items, line)
        }
        "keys" => {
            arity(1, 1)?;
            let keys = match &args[0] {
                TemplateValue::Map(m) => m.keys().map(|k| TemplateValue::from(k.as_str())).collect(),
                TemplateValue::List(items) => (0..items.len())
                    .map(|i| TemplateValue::Number(i as f64))
                    .collect(),
                _ => Vec::new(),
            };
            Ok(TemplateValue::List(keys))
        }
        "replace" => {
            arity(3, 3)?;
            let from = args[1].render();
            let subject = args[0].render();
            if from.is_empty() {
                return Ok(TemplateValue::String(subject));
            }
            Ok(TemplateValue::String(subject.replace(&from, &args[2].render())))
        }
        "json" => {
            arity(1, 1)?;
            let text = serde_json::to_string(&args[0].to_json())
                .map_err(|e| TemplateError::evaluation(e.to_string(), line))?;
            Ok(TemplateValue::String(text))
        }
        _ => Err(TemplateError::evaluation(
            format!("unknown function '{}'", name),
            line,
        )),
    }
}

fn range(args: &[TemplateValue], max_items: usize, line: usize) -> TemplateResult<TemplateValue> {
    let number = |v: &TemplateValue| match v {
        TemplateValue::Number(n) => Ok(*n),
        other => Err(TemplateError::evaluation(
            format!("range() expects numbers, got {}", other.type_name()),
            line,
        )),
    };
    let start = number(&args[0])?;
    let end = number(&args[1])?;
    let step = match args.get(2) {
        Some(v) => number(v)?.abs(),
        None => 1.0,
    };
    if step == 0.0 || step.is_nan() {
        return Err(TemplateError::evaluation("range() step must not be zero", line));
    }

    let span = ((end - start).abs() / step).floor();
    if !span.is_finite() || span >= max_items as f64 {
        return Err(TemplateError::evaluation(
            format!("range() would produce more than {} items", max_items),
            line,
        ));
    }
    let direction = if end < start { -1.0 } else { 1.0 };
    let items = (0..=span as usize)
        .map(|i| TemplateValue::Number(start + direction * step * i as f64))
        .collect();
    Ok(TemplateValue::List(items))
}

/// Escape text for HTML, quotes included.
///
/// Ampersands that already begin a character reference (`&amp;`, `&#39;`,
/// `&#x27;`) are left alone so escaping twice is harmless.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '&' if starts_with_entity(&text[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

fn starts_with_entity(text: &str) -> bool {
    let Some(body) = text
        .strip_prefix('&')
        .and_then(|rest| rest.find(';').map(|end| &rest[..end]))
    else {
        return false;
    };
    match body.strip_prefix('#') {
        Some(numeric) => match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !numeric.is_empty() && numeric.chars().all(|c| c.is_ascii_digit()),
        },
        None => {
            !body.is_empty() && body.len() <= 32 && body.chars().all(|c| c.is_ascii_alphanumeric())
        }
    }
}

/// Insert `<br />` before every line break.
pub fn nl2br(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                out.push_str("<br />\r\n");
            }
            '\n' | '\r' => {
                out.push_str("<br />");
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Key/value pairs of an iterable value, for `foreach`.
pub fn iterate(value: &TemplateValue) -> Option<Vec<(TemplateValue, TemplateValue)>> {
    match value {
        TemplateValue::Null => Some(Vec::new()),
        TemplateValue::List(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (TemplateValue::Number(i as f64), v.clone()))
                .collect(),
        ),
        TemplateValue::Map(m) => Some(map_pairs(m)),
        _ => None,
    }
}

fn map_pairs(map: &LinkedHashMap<String, TemplateValue>) -> Vec<(TemplateValue, TemplateValue)> {
    map.iter()
        .map(|(k, v)| (TemplateValue::from(k.as_str()), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> TemplateValue {
        TemplateValue::from(text)
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_does_not_double_encode() {
        assert_eq!(escape_html("&amp; &#39; &#x27; & &bogus"), "&amp; &#39; &#x27; &amp; &amp;bogus");
        let once = escape_html("<b>");
        assert_eq!(escape_html(&once), once);
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("upper", vec![s("abc")], 10, 1).unwrap(), s("ABC"));
        assert_eq!(call("trim", vec![s("  x ")], 10, 1).unwrap(), s("x"));
        assert_eq!(
            call("replace", vec![s("a-b-c"), s("-"), s("+")], 10, 1).unwrap(),
            s("a+b+c")
        );
        assert_eq!(call("nl2br", vec![s("a\nb")], 10, 1).unwrap(), s("a<br />\nb"));
    }

    #[test]
    fn test_join_and_length() {
        let list = TemplateValue::from(vec!["a", "b", "c"]);
        assert_eq!(call("join", vec![list.clone(), s(", ")], 10, 1).unwrap(), s("a, b, c"));
        assert_eq!(
            call("count", vec![list], 10, 1).unwrap(),
            TemplateValue::Number(3.0)
        );
        assert_eq!(
            call("length", vec![s("héllo")], 10, 1).unwrap(),
            TemplateValue::Number(5.0)
        );
    }

    #[test]
    fn test_default() {
        assert_eq!(call("default", vec![TemplateValue::Null, s("x")], 10, 1).unwrap(), s("x"));
        assert_eq!(call("default", vec![s(""), s("x")], 10, 1).unwrap(), s("x"));
        assert_eq!(call("default", vec![s("y"), s("x")], 10, 1).unwrap(), s("y"));
    }

    #[test]
    fn test_range() {
        let r = call("range", vec![1.0.into(), 3.0.into()], 10, 1).unwrap();
        assert_eq!(r, TemplateValue::from(vec![1.0, 2.0, 3.0]));
        let down = call("range", vec![3.0.into(), 1.0.into()], 10, 1).unwrap();
        assert_eq!(down, TemplateValue::from(vec![3.0, 2.0, 1.0]));
        assert!(call("range", vec![0.0.into(), 1e9.into()], 100, 1).is_err());
    }

    #[test]
    fn test_arity_and_unknown() {
        let err = call("upper", vec![], 10, 7).unwrap_err();
        assert!(matches!(err, TemplateError::Evaluation { line: 7, .. }));
        assert!(call("shout", vec![s("x")], 10, 1).is_err());
    }
}
