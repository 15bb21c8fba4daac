//! Filesystem sources for migration files.
//!
//! Migrators never touch `std::fs` directly. Everything goes through
//! [`MigrationFs`], so the same hashing and loading code works for:
//!
//! - files on disk ([`OsFs`])
//! - in-memory bundles built at runtime ([`MemoryFs`])
//! - bundles compiled into the binary ([`EmbeddedFs`], `embed` feature)
//!
//! Paths are logical and `/`-separated. Backslashes are accepted and
//! treated as separators so the same path string works on every platform.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FsEntry {
    /// Base name of the entry.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

impl FsEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    /// Create a directory entry.
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Read-only filesystem abstraction used for fingerprinting and loading.
pub trait MigrationFs: Send + Sync + fmt::Debug {
    /// Read the full content of one file.
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;

    /// List the direct children of a directory, in no particular order.
    fn read_dir(&self, path: &str) -> io::Result<Vec<FsEntry>>;
}

/// Normalize a logical path: unify separators, drop empty and `.` segments.
///
/// The root is the empty string. A leading `/` is kept so absolute paths
/// stay absolute.
pub fn normalize_path(path: &str) -> String {
    let joined = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if path.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Join two logical paths.
pub fn join_path(base: &str, name: &str) -> String {
    let base = normalize_path(base);
    let name = normalize_path(name);
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name,
        (_, true) => base,
        _ if base.ends_with('/') => format!("{}{}", base, name),
        _ => format!("{}/{}", base, name),
    }
}

/// The real filesystem, optionally rooted at a base directory.
#[derive(Debug, Clone, Default)]
pub struct OsFs {
    root: Option<PathBuf>,
}

impl OsFs {
    /// Paths resolve relative to the working directory (or are absolute).
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths resolve relative to `root`.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return candidate.to_path_buf();
        }
        let mut resolved = self.root.clone().unwrap_or_else(|| PathBuf::from("."));
        for segment in normalize_path(path).split('/').filter(|s| !s.is_empty()) {
            resolved.push(segment);
        }
        resolved
    }
}

impl MigrationFs for OsFs {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<FsEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            // Follow symlinks so linked migration directories are walked.
            let is_dir = std::fs::metadata(entry.path())?.is_dir();
            entries.push(FsEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        Ok(entries)
    }
}

/// An in-memory tree of files. Directories exist implicitly.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFs {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>) {
        self.files.insert(normalize_path(path), content.into());
    }

    /// Builder-style [`MemoryFs::insert`].
    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    /// Remove a file, returning its content.
    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(&normalize_path(path))
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if there are no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl MigrationFs for MemoryFs {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let path = normalize_path(path);
        self.files
            .get(&path)
            .cloned()
            .ok_or_else(|| not_found(&path))
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<FsEntry>> {
        list_children(self.files.keys().map(String::as_str), path)
    }
}

/// Derive the direct children of `dir` from a flat list of file paths.
fn list_children<'a>(files: impl Iterator<Item = &'a str>, dir: &str) -> io::Result<Vec<FsEntry>> {
    let dir = normalize_path(dir);
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    };

    let mut children = BTreeSet::new();
    let mut found = dir.is_empty();
    for file in files {
        let file = normalize_path(file);
        if file == dir {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a directory: {}", dir),
            ));
        }
        let Some(rest) = file.strip_prefix(&prefix) else {
            continue;
        };
        found = true;
        match rest.split_once('/') {
            Some((child, _)) => children.insert(FsEntry::dir(child)),
            None => children.insert(FsEntry::file(rest)),
        };
    }

    if !found {
        return Err(not_found(&dir));
    }
    Ok(children.into_iter().collect())
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such file or directory: {}", path))
}

/// Files compiled into the binary with `rust-embed`.
///
/// ```rust,ignore
/// #[derive(rust_embed::RustEmbed)]
/// #[folder = "migrations/"]
/// struct Migrations;
///
/// let fs = EmbeddedFs::<Migrations>::new();
/// ```
#[cfg(feature = "embed")]
pub struct EmbeddedFs<E> {
    _marker: std::marker::PhantomData<fn() -> E>,
}

#[cfg(feature = "embed")]
impl<E: rust_embed::RustEmbed> EmbeddedFs<E> {
    /// Create a view over the embedded bundle.
    pub fn new() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "embed")]
impl<E: rust_embed::RustEmbed> Default for EmbeddedFs<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embed")]
impl<E> fmt::Debug for EmbeddedFs<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedFs")
            .field("bundle", &std::any::type_name::<E>())
            .finish()
    }
}

#[cfg(feature = "embed")]
impl<E: rust_embed::RustEmbed> MigrationFs for EmbeddedFs<E> {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let path = normalize_path(path);
        E::get(&path)
            .map(|file| file.data.into_owned())
            .ok_or_else(|| not_found(&path))
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<FsEntry>> {
        let files: Vec<_> = E::iter().collect();
        list_children(files.iter().map(|f| f.as_ref()), path)
    }
}
