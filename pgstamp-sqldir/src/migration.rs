//! Discovery and parsing of versioned SQL migration files.
//!
//! A migration file is named `<version><anything>.sql`, where the version is
//! the leading run of ASCII digits (`20240101120000_create_users.sql`).
//! Its body is split into sections by marker comments:
//!
//! ```sql
//! -- migrate:up
//! CREATE TABLE users (id serial PRIMARY KEY);
//!
//! -- migrate:down
//! DROP TABLE users;
//! ```
//!
//! A file without markers is treated as a single `up` section. The up
//! marker accepts `transaction:false` for statements that cannot run inside
//! a transaction block (`CREATE INDEX CONCURRENTLY`, `ALTER TYPE ... ADD VALUE`).

use std::cmp::Ordering;
use std::collections::HashMap;

use pgstamp_core::{MigrationFs, MigratorError, MigratorResult, join_path};

const UP_MARKER: &str = "-- migrate:up";
const DOWN_MARKER: &str = "-- migrate:down";

/// One migration file, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    /// Version recorded in the tracking table.
    pub version: String,
    /// File name without directory.
    pub file_name: String,
    /// Logical path the file was read from.
    pub path: String,
    /// Statements applied by `migrate`.
    pub up: String,
    /// Statements for reverting, kept for completeness.
    pub down: String,
    /// Whether `up` runs inside a transaction.
    pub transaction: bool,
}

/// Extract the version from a migration file name.
///
/// Returns `None` for files that are not migrations.
pub fn parse_version(file_name: &str) -> Option<&str> {
    if !file_name.ends_with(".sql") {
        return None;
    }
    let digits = file_name
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    (digits > 0).then(|| &file_name[..digits])
}

/// Order versions numerically, without overflow for any length.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Split a migration body into its sections.
pub fn parse_sections(contents: &str) -> MigratorResult<(String, String, bool)> {
    let mut up: Option<String> = None;
    let mut down: Option<String> = None;
    let mut transaction = true;

    enum Section {
        Preamble,
        Up,
        Down,
    }
    let mut current = Section::Preamble;
    let mut preamble = String::new();

    for line in contents.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix(UP_MARKER) {
            if up.is_some() {
                return Err(MigratorError::invalid_migration("duplicate '-- migrate:up' marker"));
            }
            transaction = parse_options(rest)?;
            up = Some(String::new());
            current = Section::Up;
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(DOWN_MARKER) {
            if down.is_some() {
                return Err(MigratorError::invalid_migration(
                    "duplicate '-- migrate:down' marker",
                ));
            }
            parse_options(rest)?;
            down = Some(String::new());
            current = Section::Down;
            continue;
        }

        let target = match current {
            Section::Preamble => &mut preamble,
            Section::Up => up.get_or_insert_with(String::new),
            Section::Down => down.get_or_insert_with(String::new),
        };
        target.push_str(line);
        target.push('\n');
    }

    match (up, down) {
        (Some(up), down) => Ok((up, down.unwrap_or_default(), transaction)),
        (None, None) => Ok((preamble, String::new(), true)),
        (None, Some(_)) => Err(MigratorError::invalid_migration(
            "'-- migrate:down' without '-- migrate:up'",
        )),
    }
}

fn parse_options(rest: &str) -> MigratorResult<bool> {
    let mut transaction = true;
    for option in rest.split_whitespace() {
        match option {
            "transaction:true" => transaction = true,
            "transaction:false" => transaction = false,
            other => {
                return Err(MigratorError::invalid_migration(format!(
                    "unknown migration option '{}'",
                    other
                )));
            }
        }
    }
    Ok(transaction)
}

/// Find every migration in `dirs`, sorted by version.
///
/// Files that do not look like migrations are skipped. The same version in
/// two files is an error.
pub fn discover(fs: &dyn MigrationFs, dirs: &[String]) -> MigratorResult<Vec<SqlMigration>> {
    let mut migrations = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();

    for dir in dirs {
        let entries = fs.read_dir(dir).map_err(|e| MigratorError::io(dir, e))?;
        for entry in entries {
            if entry.is_dir {
                continue;
            }
            let Some(version) = parse_version(&entry.name) else {
                continue;
            };

            let path = join_path(dir, &entry.name);
            if let Some(previous) = seen.insert(version.to_string(), path.clone()) {
                return Err(MigratorError::invalid_migration(format!(
                    "version {} is used by both '{}' and '{}'",
                    version, previous, path
                )));
            }

            let bytes = fs.read_file(&path).map_err(|e| MigratorError::io(&path, e))?;
            let contents = String::from_utf8(bytes).map_err(|_| {
                MigratorError::invalid_migration(format!("'{}' is not valid UTF-8", path))
            })?;
            let (up, down, transaction) = parse_sections(&contents)
                .map_err(|e| MigratorError::invalid_migration(format!("{}: {}", path, e)))?;

            migrations.push(SqlMigration {
                version: version.to_string(),
                file_name: entry.name.clone(),
                path,
                up,
                down,
                transaction,
            });
        }
    }

    migrations.sort_by(|a, b| {
        compare_versions(&a.version, &b.version).then_with(|| a.file_name.cmp(&b.file_name))
    });
    Ok(migrations)
}
