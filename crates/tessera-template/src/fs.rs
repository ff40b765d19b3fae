/*
 * fs.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! File access used by the compiler and the cache.
//!
//! The engine only needs two narrow contracts: read a file's contents (or
//! learn that it is missing), and read/write/stat a path. [`TemplateFs`]
//! captures both so the engine can run against the real filesystem
//! ([`NativeFs`]) or an in-memory tree ([`MemoryFs`]) in tests and for
//! bundled templates.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Modification timestamp in milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Trait for the file operations the engine depends on.
pub trait TemplateFs {
    /// Read the file at `path`. A missing file yields `ErrorKind::NotFound`.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Whether a regular file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Last-modified time of the file at `path`.
    fn modified(&self, path: &Path) -> io::Result<Timestamp>;

    /// Write `contents` to `path`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Absolute form of `path`, used for recorded dependencies.
    fn absolute(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Filesystem implementation backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFs;

impl TemplateFs for NativeFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn modified(&self, path: &Path) -> io::Result<Timestamp> {
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(system_time_to_timestamp(modified))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Convert a `SystemTime` to milliseconds since the Unix epoch.
///
/// Times before the epoch are clamped to zero.
pub fn system_time_to_timestamp(time: SystemTime) -> Timestamp {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Timestamp)
}

/// Locate the template called `name`.
///
/// A name that exists as given is used verbatim; otherwise it is looked up
/// under `templates_path`. The result goes through [`TemplateFs::absolute`].
pub fn resolve_template_path<F: TemplateFs + ?Sized>(
    fs: &F,
    templates_path: &Path,
    name: &Path,
) -> Option<PathBuf> {
    if fs.exists(name) {
        return Some(fs.absolute(name));
    }
    let joined = templates_path.join(name);
    fs.exists(&joined).then(|| fs.absolute(&joined))
}

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: String,
    modified: Timestamp,
}

/// Filesystem held entirely in memory with a manual clock.
///
/// Every write stamps the file with the current clock value and advances the
/// clock, so consecutive writes always have strictly increasing timestamps.
/// [`MemoryFs::touch`] moves a single file's timestamp forward.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RefCell<HashMap<PathBuf, MemoryFile>>,
    clock: RefCell<Timestamp>,
}

impl MemoryFs {
    /// Create an empty in-memory filesystem with the clock at 1.
    pub fn new() -> Self {
        Self {
            files: RefCell::new(HashMap::new()),
            clock: RefCell::new(1),
        }
    }

    /// Add (or replace) a file, stamped with the current clock.
    pub fn add(&self, path: impl Into<PathBuf>, contents: impl Into<String>) -> &Self {
        let modified = self.tick();
        self.files.borrow_mut().insert(
            path.into(),
            MemoryFile {
                contents: contents.into(),
                modified,
            },
        );
        self
    }

    /// Move a file's modification time to the current clock value.
    ///
    /// Returns `false` if the file does not exist.
    pub fn touch(&self, path: &Path) -> bool {
        let modified = self.tick();
        match self.files.borrow_mut().get_mut(path) {
            Some(file) => {
                file.modified = modified;
                true
            }
            None => false,
        }
    }

    /// Remove a file. Returns `false` if it did not exist.
    pub fn remove(&self, path: &Path) -> bool {
        self.files.borrow_mut().remove(path).is_some()
    }

    /// Current contents of a file, if present.
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files.borrow().get(path).map(|f| f.contents.clone())
    }

    fn tick(&self) -> Timestamp {
        let mut clock = self.clock.borrow_mut();
        *clock += 1;
        *clock
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )
    }
}

impl TemplateFs for MemoryFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.contents(path).ok_or_else(|| Self::not_found(path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn modified(&self, path: &Path) -> io::Result<Timestamp> {
        self.files
            .borrow()
            .get(path)
            .map(|f| f.modified)
            .ok_or_else(|| Self::not_found(path))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.add(path, contents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_fs_read_missing() {
        let fs = MemoryFs::new();
        let err = fs.read_to_string(Path::new("/nope.html")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!fs.exists(Path::new("/nope.html")));
    }

    #[test]
    fn test_memory_fs_clock_advances() {
        let fs = MemoryFs::new();
        fs.add("/a.html", "a").add("/b.html", "b");
        let a = fs.modified(Path::new("/a.html")).unwrap();
        let b = fs.modified(Path::new("/b.html")).unwrap();
        assert!(b > a);

        assert!(fs.touch(Path::new("/a.html")));
        assert!(fs.modified(Path::new("/a.html")).unwrap() > b);
        assert!(!fs.touch(Path::new("/missing.html")));
    }

    #[test]
    fn test_resolve_template_path() {
        let fs = MemoryFs::new();
        fs.add("/site/pages/home.html", "home").add("/abs.html", "abs");
        let base = Path::new("/site");
        assert_eq!(
            resolve_template_path(&fs, base, Path::new("pages/home.html")),
            Some(PathBuf::from("/site/pages/home.html"))
        );
        assert_eq!(
            resolve_template_path(&fs, base, Path::new("/abs.html")),
            Some(PathBuf::from("/abs.html"))
        );
        assert_eq!(resolve_template_path(&fs, base, Path::new("nope.html")), None);
    }

    #[test]
    fn test_native_resolution_is_absolute() {
        // Tests run from the crate directory.
        let found = resolve_template_path(&NativeFs, Path::new("."), Path::new("Cargo.toml")).unwrap();
        assert!(found.is_absolute());
        assert!(found.ends_with("Cargo.toml"));
        assert!(NativeFs.exists(&found));
        assert_eq!(NativeFs.absolute(Path::new("/srv/a.html")), PathBuf::from("/srv/a.html"));
    }

    #[test]
    fn test_native_fs_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/file.txt");
        NativeFs.write(&path, "hello").unwrap();
        assert!(NativeFs.exists(&path));
        assert_eq!(NativeFs.read_to_string(&path).unwrap(), "hello");
        assert!(NativeFs.modified(&path).unwrap() > 0);
    }
}
