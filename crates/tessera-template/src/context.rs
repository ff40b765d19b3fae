/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template value and context types.
//!
//! This module defines the values a compiled template operates on and the
//! variable bindings it is executed against. Values are converted from JSON
//! (or anything `serde` can serialize) at the render boundary.

use hashlink::LinkedHashMap;
use serde::Serialize;

use crate::error::{TemplateError, TemplateResult};

/// A value that can be used in template evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TemplateValue {
    /// A null/missing value.
    #[default]
    Null,

    /// A boolean value.
    Bool(bool),

    /// A numeric value.
    Number(f64),

    /// A string value.
    String(String),

    /// A list of values.
    List(Vec<TemplateValue>),

    /// An insertion-ordered map of string keys to values.
    Map(LinkedHashMap<String, TemplateValue>),
}

impl TemplateValue {
    /// Check if this value is "truthy" for conditional evaluation.
    ///
    /// - Null, `false`, `0`, `NaN` and the empty string are falsy
    /// - Lists and maps are truthy when non-empty
    /// - Everything else is truthy (including the string `"false"`)
    pub fn is_truthy(&self) -> bool {
        match self {
            TemplateValue::Null => false,
            TemplateValue::Bool(b) => *b,
            TemplateValue::Number(n) => *n != 0.0 && !n.is_nan(),
            TemplateValue::String(s) => !s.is_empty(),
            TemplateValue::List(items) => !items.is_empty(),
            TemplateValue::Map(m) => !m.is_empty(),
        }
    }

    /// Get a nested field by path.
    ///
    /// Map keys are matched by name; list elements by their decimal index.
    pub fn get_path(&self, path: &[&str]) -> Option<&TemplateValue> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };

        let next = match self {
            TemplateValue::Map(m) => m.get(*first),
            TemplateValue::List(items) => first.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        next.and_then(|v| v.get_path(rest))
    }

    /// Render this value as a string for output.
    ///
    /// - String: returned as-is
    /// - Number: integral values without a fraction
    /// - Bool: "true" or "" (empty for false)
    /// - List: concatenation of rendered elements
    /// - Map: "true"
    /// - Null: ""
    pub fn render(&self) -> String {
        match self {
            TemplateValue::String(s) => s.clone(),
            TemplateValue::Number(n) => format_number(*n),
            TemplateValue::Bool(true) => "true".to_string(),
            TemplateValue::Bool(false) => String::new(),
            TemplateValue::List(items) => items.iter().map(|v| v.render()).collect(),
            TemplateValue::Map(_) => "true".to_string(),
            TemplateValue::Null => String::new(),
        }
    }

    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            TemplateValue::Null => "null",
            TemplateValue::Bool(_) => "bool",
            TemplateValue::Number(_) => "number",
            TemplateValue::String(_) => "string",
            TemplateValue::List(_) => "list",
            TemplateValue::Map(_) => "map",
        }
    }

    /// Convert to JSON (used by the `json` builtin).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TemplateValue::Null => serde_json::Value::Null,
            TemplateValue::Bool(b) => serde_json::Value::Bool(*b),
            TemplateValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            TemplateValue::String(s) => serde_json::Value::String(s.clone()),
            TemplateValue::List(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json()).collect())
            }
            TemplateValue::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for TemplateValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => TemplateValue::Null,
            serde_json::Value::Bool(b) => TemplateValue::Bool(b),
            serde_json::Value::Number(n) => TemplateValue::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => TemplateValue::String(s),
            serde_json::Value::Array(items) => {
                TemplateValue::List(items.into_iter().map(TemplateValue::from).collect())
            }
            serde_json::Value::Object(map) => TemplateValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, TemplateValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::String(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::String(s)
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        TemplateValue::Bool(b)
    }
}

impl From<f64> for TemplateValue {
    fn from(n: f64) -> Self {
        TemplateValue::Number(n)
    }
}

impl From<i64> for TemplateValue {
    fn from(n: i64) -> Self {
        TemplateValue::Number(n as f64)
    }
}

impl<T: Into<TemplateValue>> From<Vec<T>> for TemplateValue {
    fn from(items: Vec<T>) -> Self {
        TemplateValue::List(items.into_iter().map(Into::into).collect())
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Variable bindings a compiled template is executed against.
///
/// Rendering uses a single flat scope: loop variables and assignments made
/// by statements stay visible after the construct that introduced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    variables: LinkedHashMap<String, TemplateValue>,
}

impl TemplateContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from any serializable value whose top level is a map.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> TemplateResult<Self> {
        let value = serde_json::to_value(data)?;
        Self::from_json(value)
    }

    /// Build a context from a JSON object.
    pub fn from_json(value: serde_json::Value) -> TemplateResult<Self> {
        match TemplateValue::from(value) {
            TemplateValue::Map(variables) => Ok(Self { variables }),
            TemplateValue::Null => Ok(Self::new()),
            other => Err(TemplateError::Config {
                message: format!("template data must be a map, got {}", other.type_name()),
            }),
        }
    }

    /// Insert a variable into the context.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TemplateValue>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Get a variable from the context.
    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        self.variables.get(key)
    }

    /// Get a variable by path (e.g., `["employee", "salary"]`).
    pub fn get_path(&self, path: &[&str]) -> Option<&TemplateValue> {
        let (first, rest) = path.split_first()?;
        self.get(first).and_then(|v| v.get_path(rest))
    }

    /// Merge every binding of `other` into this context, overwriting.
    pub fn extend(&mut self, other: &TemplateContext) {
        for (k, v) in other.variables.iter() {
            self.variables.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
