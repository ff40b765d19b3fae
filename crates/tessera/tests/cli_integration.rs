/*
 * cli_integration.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for the tessera command-line interface.
 */

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn tessera(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tessera"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run tessera")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// A templates directory with a layout, a page and a partial.
fn site() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let templates = temp.path().join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::write(
        templates.join("layout.html"),
        "<title>@yield('title')</title>\n@include('footer.html')\n",
    )
    .unwrap();
    fs::write(
        templates.join("page.html"),
        "@extends('layout.html')\n@section('title'){{ site.title }} @stop\n",
    )
    .unwrap();
    fs::write(templates.join("footer.html"), "<footer>{{{ note }}}</footer>\n").unwrap();
    temp
}

fn dir_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_compile_prints_artifact() {
    let temp = site();
    let templates = dir_arg(&temp.path().join("templates"));
    let output = tessera(&["compile", "page.html", "--templates", &templates]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "<title><?= site.title ?></title>\n<footer><?= escape(note) ?></footer>\n"
    );
}

#[test]
fn test_render_with_data_and_set() {
    let temp = site();
    let templates = dir_arg(&temp.path().join("templates"));
    let cache = dir_arg(&temp.path().join("cache"));
    let data = temp.path().join("data.json");
    fs::write(&data, r#"{"site": {"title": "Blog"}, "note": "a < b"}"#).unwrap();

    let output = tessera(&[
        "render",
        "page.html",
        "--templates",
        &templates,
        "--cache",
        &cache,
        "--data",
        &dir_arg(&data),
        "--set",
        "site.title=News",
    ]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "<title>News</title>\n<footer>a &lt; b</footer>\n"
    );
}

#[test]
fn test_status_reports_freshness() {
    let temp = site();
    let templates = dir_arg(&temp.path().join("templates"));
    let cache = dir_arg(&temp.path().join("cache"));
    let args = ["--templates", templates.as_str(), "--cache", cache.as_str()];

    let before = tessera(&[&["status", "page.html"][..], &args[..]].concat());
    assert!(before.status.success());
    assert!(stdout(&before).contains(": expired\n"));

    let compile = tessera(&[&["compile", "page.html"][..], &args[..]].concat());
    assert!(compile.status.success());

    let after = tessera(&[&["status", "page.html"][..], &args[..]].concat());
    let text = stdout(&after);
    assert!(text.contains(": fresh\n"));
    assert!(text.contains("manifest: "));
}

#[test]
fn test_missing_required_template_fails() {
    let temp = site();
    let templates = dir_arg(&temp.path().join("templates"));
    fs::write(
        temp.path().join("templates/broken.html"),
        "@required('nowhere.html')",
    )
    .unwrap();
    let output = tessera(&["compile", "broken.html", "--templates", &templates, "--no-cache"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Missing required template"));
}
