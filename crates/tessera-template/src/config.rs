/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine configuration.
//!
//! [`EngineConfig`] collects everything a [`Template`](crate::Template) needs
//! besides the file system: where templates and compiled artifacts live, how
//! artifacts are named, recursion limits and the directive delimiters. It can
//! be built in code or loaded from YAML:
//!
//! ```yaml
//! templates-path: ./templates
//! cache-path: ./cache
//! encode-compiled-names: true
//! max-depth: 16
//! constants:
//!   pages: ./templates/pages
//! tags:
//!   comment: { open: "<#", close: "#>" }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::TemplateContext;
use crate::error::{TemplateError, TemplateResult};
use crate::tags::TagConfig;

/// Configuration for a template engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Base directory relative template names are resolved against.
    pub templates_path: PathBuf,

    /// Directory for compiled artifacts. `None` disables persistent caching.
    pub cache_path: Option<PathBuf>,

    /// Name artifacts by a hash of the source path instead of the path itself.
    pub encode_compiled_names: bool,

    /// Spaces per tab when normalizing captured section content.
    pub tab_width: usize,

    /// Replace tabs with spaces in the final compiled output.
    pub expand_tabs: bool,

    /// Maximum include/extends nesting depth.
    pub max_depth: usize,

    /// Maximum iterations of a single `for`/`while` loop during rendering.
    pub max_loop_iterations: usize,

    /// Directive delimiters.
    pub tags: TagConfig,

    /// Compile-time values visible to include and extends path expressions.
    pub constants: serde_json::Map<String, serde_json::Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates_path: PathBuf::from("."),
            cache_path: None,
            encode_compiled_names: true,
            tab_width: 2,
            expand_tabs: false,
            max_depth: 32,
            max_loop_iterations: 100_000,
            tags: TagConfig::default(),
            constants: serde_json::Map::new(),
        }
    }
}

impl EngineConfig {
    /// Configuration with the given templates and cache directories.
    pub fn new(templates_path: impl Into<PathBuf>, cache_path: Option<PathBuf>) -> Self {
        Self {
            templates_path: templates_path.into(),
            cache_path,
            ..Self::default()
        }
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(source: &str) -> TemplateResult<Self> {
        let config: EngineConfig =
            serde_yaml::from_str(source).map_err(|e| TemplateError::Config {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    ///
    /// Relative `templates-path` and `cache-path` entries are resolved
    /// against the directory containing the file.
    pub fn from_file(path: &Path) -> TemplateResult<Self> {
        let source = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&source).map_err(|e| match e {
            TemplateError::Config { message } => TemplateError::Config {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })?;

        let base = path.parent().unwrap_or(Path::new("."));
        if config.templates_path.is_relative() {
            config.templates_path = base.join(&config.templates_path);
        }
        if let Some(cache) = config.cache_path.as_mut() {
            if cache.is_relative() {
                *cache = base.join(&*cache);
            }
        }
        Ok(config)
    }

    /// Compile-time constants as a context for path expressions.
    pub fn constants_context(&self) -> TemplateContext {
        TemplateContext::from_json(serde_json::Value::Object(self.constants.clone()))
            .unwrap_or_default()
    }

    fn validate(&self) -> TemplateResult<()> {
        let tags = &self.tags;
        for (label, pair) in [
            ("content", &tags.content),
            ("escaped", &tags.escaped),
            ("statement", &tags.statement),
            ("comment", &tags.comment),
        ] {
            if pair.open.is_empty() || pair.close.is_empty() {
                return Err(TemplateError::Config {
                    message: format!("{} tags must not be empty", label),
                });
            }
        }
        if self.tab_width == 0 {
            return Err(TemplateError::Config {
                message: "tab-width must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagPair;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.cache_path.is_none());
        assert!(config.encode_compiled_names);
        assert_eq!(config.tab_width, 2);
        assert_eq!(config.max_depth, 32);
    }

    #[test]
    fn test_from_yaml() {
        let config = EngineConfig::from_yaml_str(
            r##"
templates-path: /srv/templates
cache-path: /srv/cache
encode-compiled-names: false
constants:
  pages: /srv/templates/pages
tags:
  comment: { open: "<#", close: "#>" }
"##,
        )
        .unwrap();

        assert_eq!(config.templates_path, PathBuf::from("/srv/templates"));
        assert_eq!(config.cache_path, Some(PathBuf::from("/srv/cache")));
        assert!(!config.encode_compiled_names);
        assert_eq!(config.tags.comment, TagPair::new("<#", "#>"));
        assert_eq!(config.tags.content, TagPair::new("{{", "}}"));
        assert_eq!(
            config.constants_context().get("pages").map(|v| v.render()),
            Some("/srv/templates/pages".to_string())
        );
    }

    #[test]
    fn test_rejects_empty_tags() {
        let err = EngineConfig::from_yaml_str("tags:\n  content: { open: \"\", close: \"}}\" }\n")
            .unwrap_err();
        assert!(matches!(err, TemplateError::Config { .. }));
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.yaml");
        std::fs::write(&path, "templates-path: views\ncache-path: .cache\n").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.templates_path, dir.path().join("views"));
        assert_eq!(config.cache_path, Some(dir.path().join(".cache")));
    }
}
