//! Loading migrations and computing their checksums.

use pgstamp_core::{MigrationFs, MigratorError, MigratorResult, join_path, normalize_path};
use sha2::{Digest, Sha256};

const EXTENSION: &str = ".sql";

/// One migration, as read from its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// File name without the `.sql` extension (`0001_users`).
    pub id: String,
    /// Full SQL text, applied as-is.
    pub sql: String,
}

impl Migration {
    /// Create a migration from its parts.
    pub fn new(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sql: sql.into(),
        }
    }

    /// Hex-encoded SHA-256 of the SQL text.
    pub fn checksum(&self) -> String {
        compute_checksum(&self.sql)
    }
}

/// Compute the checksum recorded for migration content.
pub fn compute_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Load every `*.sql` file directly inside `dir`, ordered by id.
///
/// Subdirectories are not searched.
pub fn load(fs: &dyn MigrationFs, dir: &str) -> MigratorResult<Vec<Migration>> {
    let dir = normalize_path(dir);
    let entries = fs.read_dir(&dir).map_err(|e| MigratorError::io(&dir, e))?;

    let mut migrations = Vec::new();
    for entry in entries.into_iter().filter(|e| !e.is_dir) {
        let Some(id) = entry.name.strip_suffix(EXTENSION) else {
            continue;
        };
        if id.is_empty() {
            continue;
        }

        let path = join_path(&dir, &entry.name);
        let bytes = fs.read_file(&path).map_err(|e| MigratorError::io(&path, e))?;
        let sql = String::from_utf8(bytes).map_err(|_| {
            MigratorError::invalid_migration(format!("'{}' is not valid UTF-8", path))
        })?;
        migrations.push(Migration::new(id, sql));
    }

    migrations.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(migrations)
}
