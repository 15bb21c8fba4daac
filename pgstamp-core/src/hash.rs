//! Deterministic content fingerprinting.
//!
//! A [`RecursiveHash`] folds an ordered sequence of named contributions into
//! one SHA-256 digest. Every contribution is framed as
//!
//! ```text
//! kind | len(name) | name | len(content) | content
//! ```
//!
//! with lengths as little-endian `u64`, so two different splits of the same
//! concatenated bytes can never produce the same digest. Directory walks are
//! sorted by their `/`-separated relative path before anything is hashed,
//! which makes the result independent of listing order and of the host's
//! path separator.

use std::fmt;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{MigratorError, MigratorResult};
use crate::fs::{MigrationFs, join_path, normalize_path};

const KIND_FIELD: u8 = b'f';
const KIND_CONTENT: u8 = b'c';

/// Stable identity of the state a migrator would produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The hex-encoded digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the hex-encoded digest.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fingerprint accumulator.
///
/// Created per `hash()` call, fed contributions, then consumed by
/// [`RecursiveHash::finish`]. Any failing `add_*` call returns an error and
/// callers propagate it with `?`, dropping the partial state.
#[derive(Clone, Default)]
pub struct RecursiveHash {
    hasher: Sha256,
    contributions: usize,
}

impl RecursiveHash {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`RecursiveHash::add_field`].
    pub fn with_field(mut self, name: &str, value: impl AsRef<[u8]>) -> Self {
        self.add_field(name, value);
        self
    }

    /// Contribute a named configuration value.
    ///
    /// Fields are framed differently from content so a file that happens to
    /// share a field's name cannot stand in for it.
    pub fn add_field(&mut self, name: &str, value: impl AsRef<[u8]>) {
        self.contribute(KIND_FIELD, name, value.as_ref());
    }

    /// Contribute named content.
    pub fn add(&mut self, name: &str, content: impl AsRef<[u8]>) {
        self.contribute(KIND_CONTENT, name, content.as_ref());
    }

    /// Contribute one file, keyed by its normalized path.
    pub fn add_file(&mut self, fs: &dyn MigrationFs, path: &str) -> MigratorResult<()> {
        let content = fs
            .read_file(path)
            .map_err(|e| MigratorError::io(path, e))?;
        self.add(&normalize_path(path), content);
        Ok(())
    }

    /// Contribute every file under `root` whose base name matches `pattern`,
    /// keyed by its path relative to `root`, in lexicographic order.
    pub fn add_dir(
        &mut self,
        fs: &dyn MigrationFs,
        pattern: &str,
        root: &str,
    ) -> MigratorResult<()> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| MigratorError::Pattern(format!("{}: {}", pattern, e)))?;

        let mut files = Vec::new();
        collect_files(fs, &pattern, root, "", &mut files)?;
        files.sort();

        for relative in files {
            let path = join_path(root, &relative);
            let content = fs
                .read_file(&path)
                .map_err(|e| MigratorError::io(&path, e))?;
            self.add(&relative, content);
        }
        Ok(())
    }

    /// [`RecursiveHash::add_dir`] for each root, in the order given.
    pub fn add_dirs<I, S>(
        &mut self,
        fs: &dyn MigrationFs,
        pattern: &str,
        roots: I,
    ) -> MigratorResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for root in roots {
            self.add_dir(fs, pattern, root.as_ref())?;
        }
        Ok(())
    }

    /// Number of contributions so far.
    pub fn len(&self) -> usize {
        self.contributions
    }

    /// Check if nothing has been contributed.
    pub fn is_empty(&self) -> bool {
        self.contributions == 0
    }

    /// Finalize into a [`Fingerprint`].
    pub fn finish(self) -> Fingerprint {
        let digest = hex::encode(self.hasher.finalize());
        debug!(contributions = self.contributions, fingerprint = %digest, "Computed fingerprint");
        Fingerprint(digest)
    }

    fn contribute(&mut self, kind: u8, name: &str, content: &[u8]) {
        self.hasher.update([kind]);
        self.hasher.update((name.len() as u64).to_le_bytes());
        self.hasher.update(name.as_bytes());
        self.hasher.update((content.len() as u64).to_le_bytes());
        self.hasher.update(content);
        self.contributions += 1;
    }
}

impl fmt::Debug for RecursiveHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecursiveHash")
            .field("contributions", &self.contributions)
            .finish_non_exhaustive()
    }
}

fn collect_files(
    fs: &dyn MigrationFs,
    pattern: &Pattern,
    root: &str,
    relative: &str,
    out: &mut Vec<String>,
) -> MigratorResult<()> {
    let dir = join_path(root, relative);
    let entries = fs.read_dir(&dir).map_err(|e| MigratorError::io(&dir, e))?;

    for entry in entries {
        let child = join_path(relative, &entry.name);
        if entry.is_dir {
            collect_files(fs, pattern, root, &child, out)?;
        } else if pattern.matches(&entry.name) {
            out.push(child);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use super::*;
    use crate::fs::{FsEntry, MemoryFs};
    use pretty_assertions::{assert_eq, assert_ne};

    fn sample_fs() -> MemoryFs {
        MemoryFs::new()
            .with_file("migrations/0001_users.sql", "create table users (id int);")
            .with_file("migrations/0002_cats.sql", "create table cats (id int);")
            .with_file("migrations/README.md", "not a migration")
    }

    fn hash_sql(fs: &dyn MigrationFs) -> Fingerprint {
        let mut hash = RecursiveHash::new();
        hash.add_dir(fs, "*.sql", "migrations").unwrap();
        hash.finish()
    }

    /// Lists directories in reverse order to prove sorting happens.
    #[derive(Debug)]
    struct ReversedFs(MemoryFs);

    impl MigrationFs for ReversedFs {
        fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
            self.0.read_file(path)
        }

        fn read_dir(&self, path: &str) -> io::Result<Vec<FsEntry>> {
            let mut entries = self.0.read_dir(path)?;
            entries.reverse();
            Ok(entries)
        }
    }

    /// Fails to read one specific file.
    #[derive(Debug)]
    struct BrokenFs {
        inner: MemoryFs,
        broken: String,
        reads: Mutex<usize>,
    }

    impl MigrationFs for BrokenFs {
        fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
            *self.reads.lock().unwrap() += 1;
            if path == self.broken {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.inner.read_file(path)
        }

        fn read_dir(&self, path: &str) -> io::Result<Vec<FsEntry>> {
            self.inner.read_dir(path)
        }
    }

    #[test]
    fn test_deterministic() {
        let fs = sample_fs();
        assert_eq!(hash_sql(&fs), hash_sql(&fs));
        assert_eq!(hash_sql(&fs).as_str().len(), 64);
    }

    #[test]
    fn test_listing_order_does_not_matter() {
        assert_eq!(hash_sql(&sample_fs()), hash_sql(&ReversedFs(sample_fs())));
    }

    #[test]
    fn test_separator_convention_does_not_matter() {
        let forward = sample_fs();
        let backward = MemoryFs::new()
            .with_file("migrations\\0002_cats.sql", "create table cats (id int);")
            .with_file("migrations\\0001_users.sql", "create table users (id int);");

        let mut hash = RecursiveHash::new();
        hash.add_dir(&backward, "*.sql", "migrations\\").unwrap();
        assert_eq!(hash.finish(), hash_sql(&forward));
    }

    #[test]
    fn test_one_byte_changes_fingerprint() {
        let mut changed = sample_fs();
        changed.insert("migrations/0002_cats.sql", "create table cats (id int); ");
        assert_ne!(hash_sql(&sample_fs()), hash_sql(&changed));
    }

    #[test]
    fn test_pattern_filters_files() {
        let mut with_docs = sample_fs();
        with_docs.insert("migrations/README.md", "changed docs");
        assert_eq!(hash_sql(&sample_fs()), hash_sql(&with_docs));
    }

    #[test]
    fn test_nested_directories_are_walked() {
        let mut nested = sample_fs();
        nested.insert("migrations/archive/0000_init.sql", "select 1;");
        assert_ne!(hash_sql(&sample_fs()), hash_sql(&nested));
    }

    #[test]
    fn test_renaming_a_file_changes_fingerprint() {
        let renamed = MemoryFs::new()
            .with_file("migrations/0001_people.sql", "create table users (id int);")
            .with_file("migrations/0002_cats.sql", "create table cats (id int);");
        assert_ne!(hash_sql(&sample_fs()), hash_sql(&renamed));
    }

    #[test]
    fn test_framing_prevents_collisions() {
        let mut a = RecursiveHash::new();
        a.add("ab", "c");
        let mut b = RecursiveHash::new();
        b.add("a", "bc");
        assert_ne!(a.finish(), b.finish());

        let mut joined = RecursiveHash::new();
        joined.add("x", "onetwo");
        let mut split = RecursiveHash::new();
        split.add("x", "one");
        split.add("", "two");
        assert_ne!(joined.finish(), split.finish());
    }

    #[test]
    fn test_field_differs_from_content() {
        let field = RecursiveHash::new().with_field("TableName", "schema_migrations");
        let mut content = RecursiveHash::new();
        content.add("TableName", "schema_migrations");
        assert_ne!(field.finish(), content.finish());
    }

    #[test]
    fn test_field_value_changes_fingerprint() {
        let a = RecursiveHash::new().with_field("TableName", "schema_migrations");
        let b = RecursiveHash::new().with_field("TableName", "other_migrations");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_add_file() {
        let fs = sample_fs();
        let mut a = RecursiveHash::new();
        a.add_file(&fs, "migrations/0001_users.sql").unwrap();
        let mut b = RecursiveHash::new();
        b.add_file(&fs, "./migrations\\0001_users.sql").unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_add_dirs_in_order() {
        let fs = MemoryFs::new()
            .with_file("a/0001.sql", "select 1;")
            .with_file("b/0002.sql", "select 2;");

        let mut ab = RecursiveHash::new();
        ab.add_dirs(&fs, "*.sql", ["a", "b"]).unwrap();
        let mut again = RecursiveHash::new();
        again.add_dirs(&fs, "*.sql", vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(ab.len(), 2);
        assert_eq!(ab.finish(), again.finish());
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let err = RecursiveHash::new()
            .add_dir(&sample_fs(), "*.sql", "nowhere")
            .unwrap_err();
        assert!(matches!(err, MigratorError::Io { ref path, .. } if path == "nowhere"));
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let fs = BrokenFs {
            inner: sample_fs(),
            broken: "migrations/0002_cats.sql".to_string(),
            reads: Mutex::new(0),
        };
        let err = RecursiveHash::new()
            .add_dir(&fs, "*.sql", "migrations")
            .unwrap_err();
        assert!(err.to_string().contains("0002_cats.sql"));
        assert_eq!(*fs.reads.lock().unwrap(), 2);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RecursiveHash::new()
            .add_dir(&sample_fs(), "[", "migrations")
            .unwrap_err();
        assert!(matches!(err, MigratorError::Pattern(_)));
    }

    #[test]
    fn test_empty_hash() {
        let hash = RecursiveHash::new();
        assert!(hash.is_empty());
        assert_eq!(
            hash.finish().as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
