/*
 * inheritance.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template inheritance chain.
//!
//! Compiling a template that `@extends` another pushes a new [`ChainNode`]
//! for the parent whose `child` field points back at the extending template.
//! Nodes live in a plain vector owned by the compilation; a node's `child`
//! always refers to an earlier position, so following `child` links from any
//! node terminates at the most-derived template (the one compilation started
//! with).
//!
//! Yield resolution needs two independent lookups over that chain:
//!
//! - [`find_override`]: which descendant supplies a section's content.
//! - [`resolve_parent_markers`]: replace `@parent` in that content with the
//!   nearest ancestor's content, walking back up.
//!
//! Both operate on the list returned by [`descendant_path`], whose positions
//! double as the child-to-parent map: the parent of `path[i]` is `path[i - 1]`.

use std::path::PathBuf;

use hashlink::LinkedHashMap;

use crate::deps::Dependencies;
use crate::scan::find_closer;

/// Directive name (`@parent`) that pulls ancestor content into an override.
pub const PARENT_MARKER: &str = "parent";

fn has_parent_marker(content: &str) -> bool {
    find_closer(content, PARENT_MARKER, 0).is_some()
}

/// Replace every `@parent` not running into a longer word.
fn replace_parent_markers(content: &str, with: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    while let Some(marker) = find_closer(content, PARENT_MARKER, cursor) {
        out.push_str(&content[cursor..marker.at]);
        out.push_str(with);
        cursor = marker.end;
    }
    out.push_str(&content[cursor..]);
    out
}

/// One template in an extends chain.
#[derive(Debug, Clone, Default)]
pub struct ChainNode {
    pub source_path: PathBuf,
    pub sections: LinkedHashMap<String, String>,
    pub dependencies: Dependencies,
    /// The template that extends this one.
    pub child: Option<usize>,
}

impl ChainNode {
    pub fn new(source_path: impl Into<PathBuf>, child: Option<usize>) -> Self {
        Self {
            source_path: source_path.into(),
            child,
            ..Self::default()
        }
    }

    fn has_content(&self, name: &str) -> bool {
        self.sections.get(name).is_some_and(|c| !c.is_empty())
    }
}

/// Chain positions from `current` down to the most-derived template.
///
/// `path[0]` is `current`; each following entry is the child of the previous.
pub fn descendant_path(chain: &[ChainNode], current: usize) -> Vec<usize> {
    let mut path = vec![current];
    let mut next = chain.get(current).and_then(|n| n.child);
    while let Some(index) = next {
        // Children are always pushed before their parents.
        if index >= *path.last().unwrap_or(&current) {
            break;
        }
        path.push(index);
        next = chain.get(index).and_then(|n| n.child);
    }
    path
}

/// Position in `path` of the descendant overriding section `name`.
///
/// The most-derived descendant defining the section wins. Position 0 (the
/// template doing the yielding) never counts as an override.
pub fn find_override(chain: &[ChainNode], path: &[usize], name: &str) -> Option<usize> {
    path.iter()
        .enumerate()
        .skip(1)
        .filter(|(_, index)| {
            chain
                .get(**index)
                .is_some_and(|n| n.sections.contains_key(name))
        })
        .map(|(pos, _)| pos)
        .last()
}

/// Content of section `name` at `path[source_pos]` with `@parent` resolved.
///
/// Each round replaces the markers with the content of the nearest ancestor
/// (lower position) that has non-empty content for `name`, then continues
/// upward from that ancestor. Markers left when no ancestor remains are
/// removed.
pub fn resolve_parent_markers(
    chain: &[ChainNode],
    path: &[usize],
    source_pos: usize,
    name: &str,
) -> String {
    let section = |pos: usize| {
        path.get(pos)
            .and_then(|index| chain.get(*index))
            .and_then(|node| node.sections.get(name))
    };

    let mut content = section(source_pos).cloned().unwrap_or_default();
    let mut from = source_pos;

    while has_parent_marker(&content) {
        let ancestor = (0..from).rev().find(|pos| {
            path.get(*pos)
                .and_then(|index| chain.get(*index))
                .is_some_and(|node| node.has_content(name))
        });

        match ancestor.and_then(|pos| section(pos).map(|c| (pos, c))) {
            Some((pos, ancestor_content)) => {
                content = replace_parent_markers(&content, ancestor_content);
                from = pos;
            }
            None => {
                content = replace_parent_markers(&content, "");
                break;
            }
        }
    }

    content
}

/// Content the template at `current` should emit for `yield(name)`.
///
/// A descendant override beats the template's own section; `None` means
/// nobody in the chain defines the section.
pub fn resolve_section(chain: &[ChainNode], current: usize, name: &str) -> Option<String> {
    let path = descendant_path(chain, current);
    if let Some(pos) = find_override(chain, &path, name) {
        return Some(resolve_parent_markers(chain, &path, pos, name));
    }
    chain
        .get(current)
        .and_then(|node| node.sections.get(name))
        .map(|own| replace_parent_markers(own, ""))
}
