/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled artifact cache.
//!
//! Artifacts live under the cache directory, named either by the SHA-256 of
//! the source path (flat, collision resistant) or by the source path relative
//! to the templates directory. Each artifact has a manifest beside it named
//! `_<artifact>.meta`, so a directory listing separates the two by prefix.

use std::cell::RefCell;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::deps::Dependencies;
use crate::fs::TemplateFs;

/// Computes artifact locations and decides staleness.
#[derive(Debug)]
pub struct CacheManager {
    cache_path: PathBuf,
    templates_path: PathBuf,
    encode: bool,
    /// Last computed `(source, artifact)` pair.
    memo: RefCell<Option<(PathBuf, PathBuf)>>,
}

impl CacheManager {
    pub fn new(cache_path: impl Into<PathBuf>, templates_path: impl Into<PathBuf>, encode: bool) -> Self {
        Self {
            cache_path: cache_path.into(),
            templates_path: templates_path.into(),
            encode,
            memo: RefCell::new(None),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Artifact path for `source` using the configured naming scheme.
    pub fn artifact_path(&self, source: &Path, force: bool) -> PathBuf {
        self.compiled_path(source, force, self.encode)
    }

    /// Artifact path for `source`.
    ///
    /// The result is remembered and reused until `force` is set or a
    /// different source is asked for.
    pub fn compiled_path(&self, source: &Path, force: bool, encode: bool) -> PathBuf {
        if !force {
            if let Some((memo_source, artifact)) = self.memo.borrow().as_ref() {
                if memo_source == source {
                    return artifact.clone();
                }
            }
        }

        let artifact = if encode {
            let digest = Sha256::digest(source.to_string_lossy().as_bytes());
            self.cache_path.join(hex::encode(digest))
        } else {
            self.cache_path.join(self.verbatim_name(source))
        };

        *self.memo.borrow_mut() = Some((source.to_path_buf(), artifact.clone()));
        artifact
    }

    fn verbatim_name(&self, source: &Path) -> PathBuf {
        match source.strip_prefix(&self.templates_path) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => source
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Manifest path for an artifact: `_<name>.meta` in the same directory.
    pub fn manifest_path(artifact: &Path) -> PathBuf {
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        artifact.with_file_name(format!("_{}.meta", name))
    }

    /// Whether the artifact for `source` must be rebuilt.
    ///
    /// Without a readable manifest this falls back to comparing the
    /// artifact's modification time against the source's.
    pub fn is_expired<F: TemplateFs>(&self, fs: &F, source: &Path) -> bool {
        let artifact = self.artifact_path(source, true);
        if !fs.exists(&artifact) {
            tracing::debug!(source = %source.display(), "no compiled artifact");
            return true;
        }

        let manifest_path = Self::manifest_path(&artifact);
        let manifest = if fs.exists(&manifest_path) {
            match fs
                .read_to_string(&manifest_path)
                .map_err(crate::error::TemplateError::from)
                .and_then(|text| Dependencies::from_manifest(&text))
            {
                Ok(deps) => Some(deps),
                Err(e) => {
                    tracing::warn!(
                        manifest = %manifest_path.display(),
                        error = %e,
                        "unreadable dependency manifest, comparing artifact age instead"
                    );
                    None
                }
            }
        } else {
            None
        };

        match manifest {
            Some(deps) if !deps.is_empty() => deps.iter().any(|(path, recorded)| {
                match fs.modified(path) {
                    Ok(current) if current <= recorded => false,
                    Ok(_) => {
                        tracing::debug!(dependency = %path.display(), "dependency changed");
                        true
                    }
                    Err(_) => {
                        tracing::debug!(dependency = %path.display(), "dependency missing");
                        true
                    }
                }
            }),
            _ => match (fs.modified(&artifact), fs.modified(source)) {
                (Ok(compiled), Ok(modified)) => compiled < modified,
                _ => true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    fn manager(encode: bool) -> CacheManager {
        CacheManager::new("/cache", "/templates", encode)
    }

    #[test]
    fn test_encoded_names_are_flat_and_stable() {
        let cache = manager(true);
        let a = cache.compiled_path(Path::new("/templates/a/page.html"), true, true);
        let b = cache.compiled_path(Path::new("/templates/a/page.html"), true, true);
        assert_eq!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/cache")));
        assert_eq!(a.file_name().unwrap().len(), 64);
    }

    #[test]
    fn test_verbatim_names() {
        let cache = manager(false);
        assert_eq!(
            cache.compiled_path(Path::new("/templates/a/page.html"), true, false),
            PathBuf::from("/cache/a/page.html")
        );
        assert_eq!(
            cache.compiled_path(Path::new("/elsewhere/x.html"), true, false),
            PathBuf::from("/cache/elsewhere/x.html")
        );
    }

    #[test]
    fn test_memo_until_forced() {
        let cache = manager(true);
        let first = cache.compiled_path(Path::new("/templates/a.html"), false, true);
        // A memoized path is returned even if the naming scheme is changed...
        assert_eq!(cache.compiled_path(Path::new("/templates/a.html"), false, false), first);
        // ...until recomputation is forced.
        assert_eq!(
            cache.compiled_path(Path::new("/templates/a.html"), true, false),
            PathBuf::from("/cache/a.html")
        );
    }

    #[test]
    fn test_manifest_path() {
        assert_eq!(
            CacheManager::manifest_path(Path::new("/cache/abc")),
            PathBuf::from("/cache/_abc.meta")
        );
    }

    #[test]
    fn test_expired_without_artifact() {
        let fs = MemoryFs::new();
        fs.add("/templates/a.html", "a");
        assert!(manager(true).is_expired(&fs, Path::new("/templates/a.html")));
    }

    #[test]
    fn test_expiry_without_manifest_compares_ages() {
        let fs = MemoryFs::new();
        let cache = manager(false);
        fs.add("/templates/a.html", "a");
        fs.add("/cache/a.html", "compiled");
        assert!(!cache.is_expired(&fs, Path::new("/templates/a.html")));

        fs.touch(Path::new("/templates/a.html"));
        assert!(cache.is_expired(&fs, Path::new("/templates/a.html")));
    }

    #[test]
    fn test_expiry_follows_manifest() {
        let fs = MemoryFs::new();
        let cache = manager(false);
        fs.add("/templates/a.html", "a").add("/templates/nav.html", "nav");
        fs.add("/templates/unrelated.html", "x");

        let mut deps = Dependencies::new();
        for p in ["/templates/a.html", "/templates/nav.html"] {
            deps.record(p, fs.modified(Path::new(p)).unwrap());
        }
        fs.add("/cache/_a.html.meta", deps.to_manifest().unwrap());
        fs.add("/cache/a.html", "compiled");

        let source = Path::new("/templates/a.html");
        assert!(!cache.is_expired(&fs, source));

        fs.touch(Path::new("/templates/unrelated.html"));
        assert!(!cache.is_expired(&fs, source));

        fs.touch(Path::new("/templates/nav.html"));
        assert!(cache.is_expired(&fs, source));
    }

    #[test]
    fn test_missing_dependency_expires() {
        let fs = MemoryFs::new();
        let cache = manager(false);
        fs.add("/templates/a.html", "a");
        let mut deps = Dependencies::new();
        deps.record("/templates/gone.html", 1);
        fs.add("/cache/_a.html.meta", deps.to_manifest().unwrap());
        fs.add("/cache/a.html", "compiled");
        assert!(cache.is_expired(&fs, Path::new("/templates/a.html")));
    }
}
