//! Command implementations for the Tessera CLI
//!
//! Each command module handles the CLI interface and delegates to
//! tessera-template for the actual work.

pub mod compile;
pub mod render;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tessera_template::{EngineConfig, Template};

/// Options shared by every command for locating templates and the cache.
#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Templates directory (overrides the configuration file)
    #[arg(short = 't', long)]
    pub templates: Option<PathBuf>,

    /// Artifact cache directory (overrides the configuration file)
    #[arg(long)]
    pub cache: Option<PathBuf>,
}

impl EngineArgs {
    /// Build the engine configuration: the file if given, then flag overrides.
    pub fn config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(templates) = &self.templates {
            config.templates_path = templates.clone();
        }
        if let Some(cache) = &self.cache {
            config.cache_path = Some(cache.clone());
        }
        Ok(config)
    }

    pub fn engine(&self) -> Result<Template> {
        Ok(Template::new(self.config()?))
    }
}
