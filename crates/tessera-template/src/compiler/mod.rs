/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive compiler pipeline.
//!
//! Compilation is a fixed sequence of text-to-text passes ([`PIPELINE`]).
//! Each pass rewrites one directive family; a few also record side data on
//! the template's [`ChainNode`] (captured sections, dependencies). Includes
//! and extends recurse into [`Compilation::compile_file`], which guards
//! against cycles and runaway nesting.
//!
//! Output is the artifact text understood by [`crate::script`].

mod comments;
mod control;
mod extends;
mod include;
mod interpolation;
mod sections;
mod yields;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::EngineConfig;
use crate::context::{TemplateContext, TemplateValue};
use crate::deps::Dependencies;
use crate::error::{TemplateError, TemplateResult};
use crate::fs::{TemplateFs, resolve_template_path};
use crate::inheritance::ChainNode;
use crate::scan::strip_quotes;
use crate::script;

pub use include::Requirement;

/// Information handed to compiler extensions.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionContext<'a> {
    /// File being compiled.
    pub source_path: &'a Path,
    pub config: &'a EngineConfig,
}

/// A user-supplied rewrite run before any built-in pass.
///
/// Extensions run in registration order, each receiving the previous one's
/// output. Any `Fn(&str, &ExtensionContext) -> String` closure qualifies.
pub trait CompilerExtension {
    fn compile(&self, source: &str, context: &ExtensionContext<'_>) -> String;
}

impl<F> CompilerExtension for F
where
    F: Fn(&str, &ExtensionContext<'_>) -> String,
{
    fn compile(&self, source: &str, context: &ExtensionContext<'_>) -> String {
        self(source, context)
    }
}

/// One stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Extensions,
    Comments,
    /// Statement, escaped and raw interpolation, longest opening tag first.
    Interpolation,
    Openings,
    Closings,
    Else,
    Unless,
    EndUnless,
    Includes,
    Required,
    YieldDefault,
    Section,
    Yield,
    Extends,
    /// Only runs when `expand-tabs` is enabled.
    Tabs,
}

impl Pass {
    pub fn name(self) -> &'static str {
        match self {
            Pass::Extensions => "extensions",
            Pass::Comments => "comments",
            Pass::Interpolation => "interpolation",
            Pass::Openings => "openings",
            Pass::Closings => "closings",
            Pass::Else => "else",
            Pass::Unless => "unless",
            Pass::EndUnless => "endunless",
            Pass::Includes => "includes",
            Pass::Required => "required",
            Pass::YieldDefault => "yield-default",
            Pass::Section => "section",
            Pass::Yield => "yield",
            Pass::Extends => "extends",
            Pass::Tabs => "tabs",
        }
    }
}

/// Passes in execution order.
pub const PIPELINE: [Pass; 15] = [
    Pass::Extensions,
    Pass::Comments,
    Pass::Interpolation,
    Pass::Openings,
    Pass::Closings,
    Pass::Else,
    Pass::Unless,
    Pass::EndUnless,
    Pass::Includes,
    Pass::Required,
    Pass::YieldDefault,
    Pass::Section,
    Pass::Yield,
    Pass::Extends,
    Pass::Tabs,
];

/// State for compiling one top-level template.
///
/// Owns the extends chain (node 0 is the top-level template) and the stack
/// of files currently being compiled.
pub struct Compilation<'a, F: TemplateFs> {
    config: &'a EngineConfig,
    fs: &'a F,
    extensions: &'a [Box<dyn CompilerExtension>],
    constants: TemplateContext,
    chain: Vec<ChainNode>,
    active: Vec<PathBuf>,
}

impl<'a, F: TemplateFs> Compilation<'a, F> {
    pub fn new(
        config: &'a EngineConfig,
        fs: &'a F,
        extensions: &'a [Box<dyn CompilerExtension>],
    ) -> Self {
        Self {
            config,
            fs,
            extensions,
            constants: config.constants_context(),
            chain: Vec::new(),
            active: Vec::new(),
        }
    }

    /// Compile the file at `source`.
    pub fn compile_root(&mut self, source: &Path) -> TemplateResult<String> {
        let root = self.push_node(source, None);
        self.compile_file(root, source)
    }

    /// Compile `text` as though it were the contents of `source_path`.
    ///
    /// Nothing is read for the root itself, so no dependency is recorded
    /// for it.
    pub fn compile_root_string(&mut self, source_path: &Path, text: &str) -> TemplateResult<String> {
        let root = self.push_node(source_path, None);
        self.compile_string(root, source_path, text)
    }

    /// Dependencies of the top-level template, including inherited ones.
    pub fn dependencies(&self) -> Dependencies {
        self.chain
            .first()
            .map(|node| node.dependencies.clone())
            .unwrap_or_default()
    }

    pub fn chain(&self) -> &[ChainNode] {
        &self.chain
    }

    fn push_node(&mut self, source: &Path, child: Option<usize>) -> usize {
        self.chain.push(ChainNode::new(source, child));
        self.chain.len() - 1
    }

    /// Read and compile a file on behalf of chain node `node`.
    ///
    /// The file and its modification time are recorded as a dependency of
    /// that node.
    pub(crate) fn compile_file(&mut self, node: usize, path: &Path) -> TemplateResult<String> {
        if self.active.iter().any(|p| p == path) {
            let chain = self
                .active
                .iter()
                .chain(std::iter::once(&path.to_path_buf()))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(TemplateError::CyclicDependency {
                path: path.to_path_buf(),
                chain,
            });
        }
        if self.active.len() >= self.config.max_depth {
            return Err(TemplateError::RecursionLimit {
                path: path.to_path_buf(),
                max_depth: self.config.max_depth,
            });
        }

        let text = match self.fs.read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TemplateError::MissingRequiredDependency {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let modified = self.fs.modified(path)?;
        self.chain[node].dependencies.record(path, modified);

        self.active.push(path.to_path_buf());
        let result = self.compile_string(node, path, &text);
        self.active.pop();
        result
    }

    /// Run every pass over `text`.
    pub(crate) fn compile_string(
        &mut self,
        node: usize,
        path: &Path,
        text: &str,
    ) -> TemplateResult<String> {
        let mut text = text.to_string();
        for pass in PIPELINE {
            if pass == Pass::Tabs && !self.config.expand_tabs {
                continue;
            }
            text = self.run_pass(pass, node, path, &text)?;
            debug!(
                pass = pass.name(),
                path = %path.display(),
                bytes = text.len(),
                "compiled pass"
            );
        }
        Ok(text)
    }

    fn run_pass(&mut self, pass: Pass, node: usize, path: &Path, text: &str) -> TemplateResult<String> {
        let tab_width = self.config.tab_width;
        match pass {
            Pass::Extensions => Ok(self.run_extensions(path, text)),
            Pass::Comments => comments::compile_comments(text, &self.config.tags.comment),
            Pass::Interpolation => interpolation::compile_interpolations(text, &self.config.tags),
            Pass::Openings => control::compile_openings(text),
            Pass::Closings => control::compile_closings(text),
            Pass::Else => control::compile_else(text),
            Pass::Unless => control::compile_unless(text),
            Pass::EndUnless => control::compile_end_unless(text),
            Pass::Includes => self.compile_includes(node, text, Requirement::Optional),
            Pass::Required => self.compile_includes(node, text, Requirement::Required),
            Pass::YieldDefault => {
                sections::compile_yield_defaults(text, &mut self.chain[node].sections, tab_width)
            }
            Pass::Section => {
                sections::compile_sections(text, &mut self.chain[node].sections, tab_width)
            }
            Pass::Yield => yields::compile_yields(text, &mut self.chain, node),
            Pass::Extends => self.compile_extends(node, text),
            Pass::Tabs => Ok(text.replace('\t', &" ".repeat(tab_width))),
        }
    }

    fn run_extensions(&self, path: &Path, text: &str) -> String {
        let context = ExtensionContext {
            source_path: path,
            config: self.config,
        };
        self.extensions
            .iter()
            .fold(text.to_string(), |acc, ext| ext.compile(&acc, &context))
    }

    /// Evaluate an include or extends argument to a template name.
    ///
    /// The argument is an expression over the configured constants; when it
    /// does not evaluate to a string or number it is taken literally.
    fn evaluate_name(&self, args: &str) -> String {
        match script::evaluate_expression(args, &self.constants) {
            Ok(TemplateValue::String(name)) => name,
            Ok(value @ TemplateValue::Number(_)) => value.render(),
            _ => strip_quotes(args).to_string(),
        }
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        resolve_template_path(self.fs, &self.config.templates_path, Path::new(name))
    }
}
