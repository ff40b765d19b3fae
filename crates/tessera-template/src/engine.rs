/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compile and render entry points.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::cache::CacheManager;
use crate::compiler::{Compilation, CompilerExtension};
use crate::config::EngineConfig;
use crate::context::TemplateContext;
use crate::error::{TemplateError, TemplateResult};
use crate::fs::{NativeFs, TemplateFs, resolve_template_path};
use crate::render::{RenderOptions, execute_guarded};
use crate::script::{ExecOptions, Script};

/// Options for [`Template::compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Persist the artifact and its manifest (requires a cache directory).
    pub cache: bool,
    /// Write the artifact here instead of its computed location.
    pub artifact_path: Option<PathBuf>,
    /// Return the compiled text.
    pub return_contents: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            cache: true,
            artifact_path: None,
            return_contents: true,
        }
    }
}

/// A template engine bound to a templates directory and, optionally, an
/// artifact cache.
///
/// # Example
///
/// ```
/// use tessera_template::{EngineConfig, MemoryFs, RenderOptions, Template, TemplateContext};
///
/// let fs = MemoryFs::new();
/// fs.add("/site/hello.html", "Hello, {{ name }}!");
/// let engine = Template::with_fs(EngineConfig::new("/site", Some("/cache".into())), fs);
///
/// let mut data = TemplateContext::new();
/// data.insert("name", "World");
/// let out = engine.render("hello.html", &data, &RenderOptions::default()).unwrap();
/// assert_eq!(out, "Hello, World!");
/// ```
pub struct Template<F: TemplateFs = NativeFs> {
    config: EngineConfig,
    fs: F,
    extensions: Vec<Box<dyn CompilerExtension>>,
    cache: Option<CacheManager>,
}

impl Template<NativeFs> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_fs(config, NativeFs)
    }
}

impl<F: TemplateFs> Template<F> {
    pub fn with_fs(config: EngineConfig, fs: F) -> Self {
        let mut template = Self {
            config,
            fs,
            extensions: Vec::new(),
            cache: None,
        };
        template.rebuild_cache();
        template
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn set_templates_path(&mut self, path: impl Into<PathBuf>) {
        self.config.templates_path = path.into();
        self.rebuild_cache();
    }

    /// Set or clear the artifact cache directory.
    pub fn set_cache_path(&mut self, path: Option<PathBuf>) {
        self.config.cache_path = path;
        self.rebuild_cache();
    }

    pub fn set_content_tags(&mut self, open: impl Into<String>, close: impl Into<String>) {
        self.config.tags.set_content_tags(open, close);
    }

    pub fn set_escaped_tags(&mut self, open: impl Into<String>, close: impl Into<String>) {
        self.config.tags.set_escaped_tags(open, close);
    }

    pub fn set_statement_tags(&mut self, open: impl Into<String>, close: impl Into<String>) {
        self.config.tags.set_statement_tags(open, close);
    }

    pub fn set_comment_tags(&mut self, open: impl Into<String>, close: impl Into<String>) {
        self.config.tags.set_comment_tags(open, close);
    }

    /// Register a rewrite that runs before the built-in passes.
    pub fn extend(&mut self, extension: impl CompilerExtension + 'static) -> &mut Self {
        self.extensions.push(Box::new(extension));
        self
    }

    fn rebuild_cache(&mut self) {
        self.cache = self.config.cache_path.as_ref().map(|cache_path| {
            CacheManager::new(
                cache_path,
                self.fs.absolute(&self.config.templates_path),
                self.config.encode_compiled_names,
            )
        });
    }

    /// Locate a template by name.
    pub fn resolve_path(&self, name: impl AsRef<Path>) -> TemplateResult<PathBuf> {
        let name = name.as_ref();
        resolve_template_path(&self.fs, &self.config.templates_path, name).ok_or_else(|| {
            TemplateError::MissingRequiredDependency {
                path: name.to_path_buf(),
            }
        })
    }

    /// Compile a template.
    ///
    /// With `options.cache` set and a cache directory configured the
    /// artifact and its dependency manifest are written. Returns the
    /// compiled text when `options.return_contents` is set.
    pub fn compile(
        &self,
        name: impl AsRef<Path>,
        options: &CompileOptions,
    ) -> TemplateResult<Option<String>> {
        let source = self.resolve_path(name)?;
        let mut compilation = Compilation::new(&self.config, &self.fs, &self.extensions);
        let compiled = compilation.compile_root(&source)?;
        let dependencies = compilation.dependencies();

        match (&self.cache, options.cache) {
            (Some(cache), true) => {
                let artifact = options
                    .artifact_path
                    .clone()
                    .unwrap_or_else(|| cache.artifact_path(&source, true));
                let manifest = CacheManager::manifest_path(&artifact);
                self.fs
                    .write(&artifact, &format!("{}{}", compiled, build_marker(&source)))?;
                self.fs.write(&manifest, &dependencies.to_manifest()?)?;
                info!(
                    source = %source.display(),
                    artifact = %artifact.display(),
                    dependencies = dependencies.len(),
                    "wrote compiled template"
                );
            }
            (None, true) => {
                debug!(source = %source.display(), "no cache directory; artifact not written");
            }
            (_, false) => {}
        }

        Ok(options.return_contents.then_some(compiled))
    }

    /// Compile template text that does not live in a file.
    ///
    /// Relative includes and extends resolve against the templates
    /// directory. Nothing is cached.
    pub fn compile_string(&self, text: &str) -> TemplateResult<String> {
        let mut compilation = Compilation::new(&self.config, &self.fs, &self.extensions);
        compilation.compile_root_string(&self.config.templates_path, text)
    }

    /// Whether the cached artifact for a template must be rebuilt.
    ///
    /// Always true without a cache directory.
    pub fn is_expired(&self, name: impl AsRef<Path>) -> TemplateResult<bool> {
        let source = self.resolve_path(name)?;
        Ok(match &self.cache {
            Some(cache) => cache.is_expired(&self.fs, &source),
            None => true,
        })
    }

    /// Artifact location for a template, if a cache directory is set.
    pub fn artifact_path(&self, name: impl AsRef<Path>) -> TemplateResult<Option<PathBuf>> {
        let source = self.resolve_path(name)?;
        Ok(self
            .cache
            .as_ref()
            .map(|cache| cache.artifact_path(&source, true)))
    }

    /// Text of the cached artifact, recompiling first when it is stale.
    pub fn compiled_file(&self, name: impl AsRef<Path>) -> TemplateResult<String> {
        let name = name.as_ref();
        let cache = self.cache.as_ref().ok_or_else(|| TemplateError::Config {
            message: "no cache directory configured".to_string(),
        })?;
        let source = self.resolve_path(name)?;
        if cache.is_expired(&self.fs, &source) {
            self.compile(
                name,
                &CompileOptions {
                    return_contents: false,
                    ..CompileOptions::default()
                },
            )?;
        }
        Ok(self.fs.read_to_string(&cache.artifact_path(&source, true))?)
    }

    /// Render a template against `context`.
    ///
    /// Compile errors (missing required files, cycles, malformed directives)
    /// are returned. Failures while executing the compiled template are not:
    /// they produce a notice in place of the output.
    pub fn render(
        &self,
        name: impl AsRef<Path>,
        context: &TemplateContext,
        options: &RenderOptions,
    ) -> TemplateResult<String> {
        let name = name.as_ref();
        let display_name = name.display().to_string();
        let exec = ExecOptions {
            strict: options.strict,
            max_loop_iterations: self.config.max_loop_iterations,
        };

        let (file, script) = match (&self.cache, options.use_cache) {
            (Some(cache), true) => {
                let source = self.resolve_path(name)?;
                if cache.is_expired(&self.fs, &source) {
                    debug!(template = %display_name, "artifact is stale; recompiling");
                    self.compile(
                        name,
                        &CompileOptions {
                            return_contents: false,
                            ..CompileOptions::default()
                        },
                    )?;
                }
                let artifact = cache.artifact_path(&source, true);
                let text = self.fs.read_to_string(&artifact)?;
                (artifact, Script::parse(&text))
            }
            _ => {
                warn!(
                    template = %display_name,
                    "rendering without the artifact cache; intended for development only"
                );
                let source = self.resolve_path(name)?;
                let compiled = self
                    .compile(
                        name,
                        &CompileOptions {
                            cache: false,
                            ..CompileOptions::default()
                        },
                    )?
                    .unwrap_or_default();
                (source, Script::parse(&compiled))
            }
        };

        Ok(execute_guarded(
            &display_name,
            &file,
            script,
            context,
            exec,
            options.debug,
        ))
    }

    /// Render into a writer.
    pub fn render_to<W: Write>(
        &self,
        name: impl AsRef<Path>,
        context: &TemplateContext,
        options: &RenderOptions,
        mut out: W,
    ) -> TemplateResult<()> {
        let rendered = self.render(name, context, options)?;
        out.write_all(rendered.as_bytes())?;
        Ok(())
    }
}

/// Trailing comment recording when and from what an artifact was built.
fn build_marker(source: &Path) -> String {
    let seconds = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!("<?# compiled {} from {} ?>\n", seconds, source.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::Dependencies;
    use crate::fs::MemoryFs;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn engine(fs: MemoryFs) -> Template<MemoryFs> {
        Template::with_fs(EngineConfig::new("/t", Some(PathBuf::from("/cache"))), fs)
    }

    fn data(value: serde_json::Value) -> TemplateContext {
        TemplateContext::from_json(value).unwrap()
    }

    fn site() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.add(
            "/t/layout.html",
            "<html>\n<head><title>@yield('title')</title></head>\n<body>\n  @yield('body')\n</body>\n</html>\n",
        )
        .add(
            "/t/page.html",
            "@extends('layout.html')\n@section('title'){{ title }}@stop\n@section('body')\n  @include('list.html')\n@stop\n",
        )
        .add(
            "/t/list.html",
            "<ul>\n@foreach(items as item)\n  <li>{{{ item }}}</li>\n@endforeach\n</ul>\n",
        )
        .add("/t/unrelated.html", "nobody includes me");
        fs
    }

    #[test]
    fn test_render_cached_site() {
        let engine = engine(site());
        let out = engine
            .render(
                "page.html",
                &data(json!({"title": "Fruit", "items": ["apple", "<pear>"]})),
                &RenderOptions::default(),
            )
            .unwrap();
        assert_eq!(
            out,
            "<html>\n<head><title>Fruit</title></head>\n<body>\n  <ul>\n    <li>apple</li>\n    <li>&lt;pear&gt;</li>\n  </ul>\n</body>\n</html>\n"
        );
    }

    #[test]
    fn test_cached_and_uncached_agree() {
        let engine = engine(site());
        let context = data(json!({"title": "T", "items": [1, 2]}));
        let cached = engine
            .render("page.html", &context, &RenderOptions::default())
            .unwrap();
        let uncached = engine
            .render(
                "page.html",
                &context,
                &RenderOptions {
                    use_cache: false,
                    ..RenderOptions::default()
                },
            )
            .unwrap();
        assert_eq!(cached, uncached);
    }

    #[test]
    fn test_compile_persists_artifact_and_manifest() {
        let engine = engine(site());
        let compiled = engine
            .compile("page.html", &CompileOptions::default())
            .unwrap()
            .unwrap();

        let artifact = engine.artifact_path("page.html").unwrap().unwrap();
        let stored = engine.fs().contents(&artifact).unwrap();
        assert!(stored.starts_with(&compiled));
        assert!(stored.contains("<?# compiled "));
        assert!(stored.ends_with(" from /t/page.html ?>\n"));

        let manifest = engine
            .fs()
            .contents(&CacheManager::manifest_path(&artifact))
            .unwrap();
        let deps = Dependencies::from_manifest(&manifest).unwrap();
        let paths: Vec<_> = deps.iter().map(|(p, _)| p.to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/t/page.html"),
                PathBuf::from("/t/list.html"),
                PathBuf::from("/t/layout.html"),
            ]
        );
    }

    #[test]
    fn test_uncached_compile_writes_nothing() {
        let engine = engine(site());
        let out = engine
            .compile(
                "page.html",
                &CompileOptions {
                    cache: false,
                    ..CompileOptions::default()
                },
            )
            .unwrap();
        assert!(out.is_some());
        let artifact = engine.artifact_path("page.html").unwrap().unwrap();
        assert!(!engine.fs().exists(&artifact));
        assert!(engine.is_expired("page.html").unwrap());
    }

    #[test]
    fn test_expiry_tracks_dependencies() {
        let engine = engine(site());
        engine.compile("page.html", &CompileOptions::default()).unwrap();
        assert!(!engine.is_expired("page.html").unwrap());

        engine.fs().touch(Path::new("/t/unrelated.html"));
        assert!(!engine.is_expired("page.html").unwrap());

        engine.fs().touch(Path::new("/t/list.html"));
        assert!(engine.is_expired("page.html").unwrap());

        engine.compile("page.html", &CompileOptions::default()).unwrap();
        assert!(!engine.is_expired("page.html").unwrap());

        engine.fs().remove(Path::new("/t/layout.html"));
        assert!(engine.is_expired("page.html").unwrap());
    }

    #[test]
    fn test_render_recompiles_stale_artifact() {
        let engine = engine(site());
        let context = data(json!({"title": "T", "items": ["a"]}));
        engine
            .render("page.html", &context, &RenderOptions::default())
            .unwrap();

        engine
            .fs()
            .add("/t/list.html", "<ol>{{ length(items) }}</ol>\n");
        let out = engine
            .render("page.html", &context, &RenderOptions::default())
            .unwrap();
        assert!(out.contains("  <ol>1</ol>\n"));
    }

    #[test]
    fn test_compiled_file() {
        let engine = engine(site());
        let first = engine.compiled_file("list.html").unwrap();
        assert!(first.starts_with("<ul>\n<?tpl foreach(items as item): ?>\n"));
        assert!(!engine.is_expired("list.html").unwrap());
        assert_eq!(engine.compiled_file("list.html").unwrap(), first);
    }

    #[test]
    fn test_compile_errors_propagate_from_render() {
        let fs = MemoryFs::new();
        fs.add("/t/page.html", "@required('ghost.html')");
        let err = engine(fs)
            .render("page.html", &TemplateContext::new(), &RenderOptions::default())
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingRequiredDependency { .. }));
    }

    #[test]
    fn test_execution_failure_becomes_notice() {
        let fs = MemoryFs::new();
        fs.add("/t/page.html", "partial {{ 1 / 0 }}");
        let out = engine(fs)
            .render("page.html", &TemplateContext::new(), &RenderOptions::default())
            .unwrap();
        assert_eq!(out, "Oops, something went wrong rendering template: page.html<br>\n");
    }

    #[test]
    fn test_strict_rendering() {
        let fs = MemoryFs::new();
        fs.add("/t/page.html", "[{{ missing }}]");
        let engine = engine(fs);
        let lenient = engine
            .render("page.html", &TemplateContext::new(), &RenderOptions::default())
            .unwrap();
        assert_eq!(lenient, "[]");
        let strict = engine
            .render(
                "page.html",
                &TemplateContext::new(),
                &RenderOptions {
                    strict: true,
                    debug: true,
                    ..RenderOptions::default()
                },
            )
            .unwrap();
        assert!(strict.contains("undefined variable 'missing'"));
    }

    #[test]
    fn test_custom_tags_and_extensions() {
        let fs = MemoryFs::new();
        fs.add("/t/page.html", "<%= name %> :smile:");
        let mut engine = engine(fs);
        engine.set_content_tags("<%=", "%>");
        engine.extend(|text: &str, _: &crate::compiler::ExtensionContext<'_>| {
            text.replace(":smile:", "{{ ':)' }}")
        });
        let out = engine
            .render("page.html", &data(json!({"name": "Ada"})), &RenderOptions::default())
            .unwrap();
        assert_eq!(out, "Ada {{ ':)' }}");
    }

    #[test]
    fn test_verbatim_artifact_names() {
        let mut config = EngineConfig::new("/t", Some(PathBuf::from("/cache")));
        config.encode_compiled_names = false;
        let engine = Template::with_fs(config, site());
        assert_eq!(
            engine.artifact_path("list.html").unwrap(),
            Some(PathBuf::from("/cache/list.html"))
        );
    }

    #[test]
    fn test_missing_template() {
        let engine = engine(MemoryFs::new());
        assert!(matches!(
            engine.resolve_path("nope.html").unwrap_err(),
            TemplateError::MissingRequiredDependency { .. }
        ));
    }
}
