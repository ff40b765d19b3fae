/*
 * tags.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Delimiter configuration for tag-style directives.
//!
//! Four delimiter pairs are recognized:
//!
//! | Pair | Default | Compiles to |
//! |------|---------|-------------|
//! | content | `{{ expr }}` | raw output |
//! | escaped | `{{{ expr }}}` | HTML-escaped output |
//! | statement | `{{~ stmt ~}}` | executable statement |
//! | comment | `{* text *}` | nothing |
//!
//! The pairs overlap (`{{` is a prefix of both `{{{` and `{{~`), so the
//! compiler consults [`TagConfig::interpolation_order`] to consume longer
//! opening tags before shorter ones.

use serde::{Deserialize, Serialize};

/// An opening/closing delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPair {
    pub open: String,
    pub close: String,
}

impl TagPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

/// The tag families that share the interpolation syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationKind {
    Statement,
    Escaped,
    Content,
}

/// The four delimiter pairs used to recognize tag-style directives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub content: TagPair,
    pub escaped: TagPair,
    pub statement: TagPair,
    pub comment: TagPair,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            content: TagPair::new("{{", "}}"),
            escaped: TagPair::new("{{{", "}}}"),
            statement: TagPair::new("{{~", "~}}"),
            comment: TagPair::new("{*", "*}"),
        }
    }
}

impl TagConfig {
    pub fn set_content_tags(&mut self, open: impl Into<String>, close: impl Into<String>) {
        self.content = TagPair::new(open, close);
    }

    pub fn set_escaped_tags(&mut self, open: impl Into<String>, close: impl Into<String>) {
        self.escaped = TagPair::new(open, close);
    }

    pub fn set_statement_tags(&mut self, open: impl Into<String>, close: impl Into<String>) {
        self.statement = TagPair::new(open, close);
    }

    pub fn set_comment_tags(&mut self, open: impl Into<String>, close: impl Into<String>) {
        self.comment = TagPair::new(open, close);
    }

    /// Order in which the interpolation-family passes must run.
    ///
    /// Longer opening tags come first, so `{{{` and `{{~` are consumed before
    /// `{{` can match their prefix. Ties keep the statement, escaped, content
    /// order.
    pub fn interpolation_order(&self) -> [InterpolationKind; 3] {
        let mut kinds = [
            InterpolationKind::Statement,
            InterpolationKind::Escaped,
            InterpolationKind::Content,
        ];
        kinds.sort_by_key(|kind| std::cmp::Reverse(self.pair(*kind).open.len()));
        kinds
    }

    pub fn pair(&self, kind: InterpolationKind) -> &TagPair {
        match kind {
            InterpolationKind::Statement => &self.statement,
            InterpolationKind::Escaped => &self.escaped,
            InterpolationKind::Content => &self.content,
        }
    }
}
