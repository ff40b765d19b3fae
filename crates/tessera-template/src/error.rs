/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and rendering.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A required include, an extends target or the requested template itself
    /// could not be found.
    #[error("Missing required template: {}", path.display())]
    MissingRequiredDependency { path: PathBuf },

    /// A template was re-entered while it was still being compiled.
    #[error("Cyclic template dependency on {}: {chain}", path.display())]
    CyclicDependency { path: PathBuf, chain: String },

    /// Include/extends nesting went deeper than the configured limit.
    #[error("Template nesting exceeds depth {max_depth} at {}", path.display())]
    RecursionLimit { path: PathBuf, max_depth: usize },

    /// A `@section` was opened while another section was still open.
    #[error("Nested section '{name}' is not supported")]
    NestedSection { name: String },

    /// Malformed directive or compiled script.
    #[error("Syntax error: {message}")]
    Syntax { message: String },

    /// The compiled artifact failed while executing.
    ///
    /// `trace` lists the enclosing constructs, innermost first.
    #[error("Evaluation error on line {line}: {message}")]
    Evaluation {
        message: String,
        line: usize,
        trace: Vec<String>,
    },

    /// Invalid engine configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A dependency manifest could not be (de)serialized.
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// I/O error (reading a template, writing an artifact).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TemplateError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        TemplateError::Syntax {
            message: message.into(),
        }
    }

    pub(crate) fn evaluation(message: impl Into<String>, line: usize) -> Self {
        TemplateError::Evaluation {
            message: message.into(),
            line,
            trace: Vec::new(),
        }
    }

    /// Short kind name used in render failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            TemplateError::MissingRequiredDependency { .. } => "MissingRequiredDependency",
            TemplateError::CyclicDependency { .. } => "CyclicDependency",
            TemplateError::RecursionLimit { .. } => "RecursionLimit",
            TemplateError::NestedSection { .. } => "NestedSection",
            TemplateError::Syntax { .. } => "SyntaxError",
            TemplateError::Evaluation { .. } => "RenderExecutionFailure",
            TemplateError::Config { .. } => "ConfigError",
            TemplateError::Manifest(_) => "ManifestError",
            TemplateError::Io(_) => "IoError",
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_display() {
        let err = TemplateError::MissingRequiredDependency {
            path: PathBuf::from("partials/nav.html"),
        };
        assert_eq!(err.to_string(), "Missing required template: partials/nav.html");
        assert_eq!(err.kind(), "MissingRequiredDependency");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TemplateError = io_err.into();
        assert!(matches!(err, TemplateError::Io(_)));
    }
}
