/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive template compiler with inheritance and an artifact cache.
//!
//! Templates are plain text annotated with directives:
//!
//! - Interpolation: `{{ expr }}`, escaped `{{{ expr }}}`
//! - Raw statements: `{{~ total = 0 ~}}`
//! - Comments: `{* ignored *}`
//! - Control flow: `@if(...)`, `@elseif(...)`, `@else`, `@endif`,
//!   `@unless(...)`/`@endunless`, `@foreach(items as item)`/`@endforeach`,
//!   `@for(...)`/`@endfor`, `@while(...)`/`@endwhile`
//! - Composition: `@include(path)`, `@required(path)`
//! - Inheritance: `@extends(path)`, `@section(name)...@stop`,
//!   `@yieldDefault(name)...@show`, `@yield(name)`, and `@parent` inside an
//!   overriding section
//!
//! # Architecture
//!
//! Compilation is a fixed pipeline of text rewrites ([`compiler`]) that
//! turns directives into a small executable artifact format ([`script`]).
//! Includes and extends are compiled recursively; every file read is
//! recorded with its modification time ([`Dependencies`]). The
//! [`CacheManager`] persists artifacts next to a dependency manifest and
//! rebuilds them only when one of those files changes.
//!
//! Rendering executes the artifact against a [`TemplateContext`]. Failures
//! during execution never escape [`Template::render`]: the partial output is
//! discarded and a failure notice is returned instead.
//!
//! # Example
//!
//! ```
//! use tessera_template::{EngineConfig, MemoryFs, RenderOptions, Template, TemplateContext};
//!
//! let fs = MemoryFs::new();
//! fs.add("/site/layout.html", "<h1>@yield('title')</h1>\n");
//! fs.add("/site/page.html", "@extends('layout.html')\n@section('title'){{ upper(name) }}@stop\n");
//!
//! let engine = Template::with_fs(EngineConfig::new("/site", None), fs);
//! let mut data = TemplateContext::new();
//! data.insert("name", "tessera");
//! let out = engine.render("page.html", &data, &RenderOptions::default()).unwrap();
//! assert_eq!(out, "<h1>TESSERA</h1>\n");
//! ```

pub mod cache;
pub mod compiler;
pub mod config;
pub mod context;
pub mod deps;
pub mod engine;
pub mod error;
pub mod fs;
pub mod inheritance;
pub mod render;
pub mod scan;
pub mod script;
pub mod tags;

// Re-export main types at crate root
pub use cache::CacheManager;
pub use compiler::{CompilerExtension, ExtensionContext};
pub use config::EngineConfig;
pub use context::{TemplateContext, TemplateValue};
pub use deps::Dependencies;
pub use engine::{CompileOptions, Template};
pub use error::{TemplateError, TemplateResult};
pub use fs::{MemoryFs, NativeFs, TemplateFs};
pub use render::RenderOptions;
pub use script::{ExecOptions, Script};
pub use tags::{TagConfig, TagPair};
