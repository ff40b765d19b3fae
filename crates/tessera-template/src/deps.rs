/*
 * deps.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Dependency tracking for compiled artifacts.
//!
//! Every file read while compiling a template (the template itself, its
//! includes and every ancestor reached through `@extends`) is recorded with
//! the modification time seen at compile time. The resulting set is persisted
//! next to the artifact as a JSON manifest and later compared against the
//! current modification times to decide whether the artifact is stale.

use std::path::{Path, PathBuf};

use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};

use crate::error::TemplateResult;
use crate::fs::Timestamp;

/// Ordered mapping of file path to the modification time seen at compile time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dependencies {
    entries: LinkedHashMap<PathBuf, Timestamp>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) a dependency.
    pub fn record(&mut self, path: impl Into<PathBuf>, modified: Timestamp) {
        self.entries.insert(path.into(), modified);
    }

    /// Add the entries of `other` whose paths are not recorded yet.
    ///
    /// Used when an extended parent hands its dependencies down to the
    /// extending child: the child's own observations win.
    pub fn merge_missing(&mut self, other: &Dependencies) {
        for (path, modified) in other.entries.iter() {
            if !self.entries.contains_key(path) {
                self.entries.insert(path.clone(), *modified);
            }
        }
    }

    pub fn get(&self, path: &Path) -> Option<Timestamp> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, Timestamp)> {
        self.entries.iter().map(|(p, t)| (p.as_path(), *t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as manifest text.
    pub fn to_manifest(&self) -> TemplateResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse manifest text.
    pub fn from_manifest(text: &str) -> TemplateResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateError;

    #[test]
    fn test_merge_missing_keeps_child_entries() {
        let mut child = Dependencies::new();
        child.record("/t/page.html", 10);
        child.record("/t/shared.html", 10);

        let mut parent = Dependencies::new();
        parent.record("/t/layout.html", 20);
        parent.record("/t/shared.html", 30);

        child.merge_missing(&parent);
        assert_eq!(child.len(), 3);
        assert_eq!(child.get(Path::new("/t/shared.html")), Some(10));
        assert_eq!(child.get(Path::new("/t/layout.html")), Some(20));
    }

    #[test]
    fn test_manifest_is_a_json_object() {
        let mut deps = Dependencies::new();
        deps.record("/t/page.html", 1_700_000_000_123);
        deps.record("/t/nav.html", 1_700_000_000_456);

        let manifest = deps.to_manifest().unwrap();
        let value: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(value["/t/nav.html"], serde_json::json!(1_700_000_000_456_i64));

        let parsed = Dependencies::from_manifest(&manifest).unwrap();
        let order: Vec<&Path> = parsed.iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec![Path::new("/t/page.html"), Path::new("/t/nav.html")]);
    }

    #[test]
    fn test_corrupt_manifest() {
        let err = Dependencies::from_manifest("{not json").unwrap_err();
        assert!(matches!(err, TemplateError::Manifest(_)));
    }
}
