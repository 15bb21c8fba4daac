//! The SQL directory [`Migrator`].

use std::sync::Arc;

use async_trait::async_trait;
use pgstamp_core::{
    Config, Fingerprint, MigrationFs, Migrator, MigratorError, MigratorResult, OsFs,
    RecursiveHash, normalize_path, quote_qualified,
};
use tokio_postgres::Client;

use crate::engine::SqlDirEngine;

/// Default migrations directory.
pub const DEFAULT_DIR: &str = "db/migrations";

/// Default tracking table.
pub const DEFAULT_TABLE_NAME: &str = "schema_migrations";

/// Options for [`SqlDirMigrator`].
///
/// Every field is optional; unset fields take their defaults in
/// [`SqlDirMigrator::new`]. Setting a field twice keeps the last value.
#[derive(Debug, Clone, Default)]
pub struct SqlDirOptions {
    dirs: Option<Vec<String>>,
    table_name: Option<String>,
    fs: Option<Arc<dyn MigrationFs>>,
}

impl SqlDirOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read migrations from a single directory.
    pub fn dir(self, dir: impl Into<String>) -> Self {
        self.dirs([dir.into()])
    }

    /// Read migrations from several directories. Pass them all at once;
    /// a later call replaces the list.
    pub fn dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dirs = Some(dirs.into_iter().map(Into::into).collect());
        self
    }

    /// Name of the table recording applied versions
    /// (default `schema_migrations`).
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Read migration files from `fs` instead of the working directory.
    pub fn fs(self, fs: impl MigrationFs + 'static) -> Self {
        self.shared_fs(Arc::new(fs))
    }

    /// [`SqlDirOptions::fs`] for an already shared source.
    pub fn shared_fs(mut self, fs: Arc<dyn MigrationFs>) -> Self {
        self.fs = Some(fs);
        self
    }
}

/// A [`Migrator`] that applies directories of versioned `*.sql` files with
/// the in-process [`SqlDirEngine`].
///
/// `migrate` creates the target database when missing, then applies every
/// pending migration. `prepare` and `verify` are no-ops.
#[derive(Debug, Clone)]
pub struct SqlDirMigrator {
    dirs: Vec<String>,
    table_name: String,
    fs: Arc<dyn MigrationFs>,
}

impl SqlDirMigrator {
    /// Validate `options` and fill in defaults.
    pub fn new(options: SqlDirOptions) -> MigratorResult<Self> {
        let dirs = options
            .dirs
            .unwrap_or_else(|| vec![DEFAULT_DIR.to_string()]);
        if dirs.is_empty() {
            return Err(MigratorError::config(
                "at least one migrations directory is required",
            ));
        }
        let dirs = dirs.iter().map(|d| normalize_path(d)).collect();

        let table_name = options
            .table_name
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
        quote_qualified(&table_name)?;

        Ok(Self {
            dirs,
            table_name,
            fs: options.fs.unwrap_or_else(|| Arc::new(OsFs::new())),
        })
    }

    /// Configured directories, normalized.
    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }

    /// Configured tracking table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Build the engine for the database described by `config`.
    pub fn engine(&self, config: &Config) -> MigratorResult<SqlDirEngine> {
        SqlDirEngine::new(
            config.clone(),
            self.dirs.clone(),
            &self.table_name,
            self.fs.clone(),
        )
    }
}

#[async_trait]
impl Migrator for SqlDirMigrator {
    fn hash(&self) -> MigratorResult<Fingerprint> {
        let mut hash = RecursiveHash::new().with_field("MigrationsTableName", &self.table_name);
        hash.add_dirs(self.fs.as_ref(), "*.sql", &self.dirs)?;
        Ok(hash.finish())
    }

    /// No-op.
    async fn prepare(&self, _client: &Client, _config: &Config) -> MigratorResult<()> {
        Ok(())
    }

    async fn migrate(&self, _client: &Client, config: &Config) -> MigratorResult<()> {
        self.engine(config)?.create_and_migrate().await?;
        Ok(())
    }

    /// No-op.
    async fn verify(&self, _client: &Client, _config: &Config) -> MigratorResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgstamp_core::MemoryFs;
    use pretty_assertions::{assert_eq, assert_ne};

    fn fs() -> MemoryFs {
        MemoryFs::new()
            .with_file(
                "db/migrations/0001_users.sql",
                "-- migrate:up\nCREATE TABLE users (id serial PRIMARY KEY);\n",
            )
            .with_file(
                "db/migrations/0002_cats.sql",
                "-- migrate:up\nCREATE TABLE cats (id serial PRIMARY KEY);\n",
            )
    }

    #[test]
    fn test_defaults() {
        let migrator = SqlDirMigrator::new(SqlDirOptions::new()).unwrap();
        assert_eq!(migrator.dirs(), &["db/migrations".to_string()]);
        assert_eq!(migrator.table_name(), "schema_migrations");
    }

    #[test]
    fn test_last_write_wins() {
        let migrator = SqlDirMigrator::new(
            SqlDirOptions::new()
                .table_name("first")
                .dir("a")
                .table_name("second")
                .dirs(["b", "c"]),
        )
        .unwrap();
        assert_eq!(migrator.table_name(), "second");
        assert_eq!(migrator.dirs(), &["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_validation() {
        let empty: [&str; 0] = [];
        assert!(SqlDirMigrator::new(SqlDirOptions::new().dirs(empty)).is_err());
        assert!(SqlDirMigrator::new(SqlDirOptions::new().table_name("bad name")).is_err());
    }

    #[test]
    fn test_hash_is_stable() {
        let migrator = SqlDirMigrator::new(SqlDirOptions::new().fs(fs())).unwrap();
        assert_eq!(migrator.hash().unwrap(), migrator.hash().unwrap());
    }

    #[test]
    fn test_hash_tracks_table_name() {
        let default = SqlDirMigrator::new(SqlDirOptions::new().fs(fs())).unwrap();
        let custom =
            SqlDirMigrator::new(SqlDirOptions::new().fs(fs()).table_name("custom_migrations"))
                .unwrap();
        assert_ne!(default.hash().unwrap(), custom.hash().unwrap());
    }

    #[test]
    fn test_hash_tracks_content_but_not_other_files() {
        let base = SqlDirMigrator::new(SqlDirOptions::new().fs(fs())).unwrap();

        let with_readme = SqlDirMigrator::new(
            SqlDirOptions::new().fs(fs().with_file("db/migrations/README.md", "docs")),
        )
        .unwrap();
        assert_eq!(base.hash().unwrap(), with_readme.hash().unwrap());

        let edited = SqlDirMigrator::new(SqlDirOptions::new().fs(fs().with_file(
            "db/migrations/0002_cats.sql",
            "-- migrate:up\nCREATE TABLE cats (id serial PRIMARY KEY);\n-- comment\n",
        )))
        .unwrap();
        assert_ne!(base.hash().unwrap(), edited.hash().unwrap());
    }

    #[test]
    fn test_hash_matches_disk_and_memory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("db").join("migrations");
        std::fs::create_dir_all(&dir).unwrap();
        for (name, content) in [
            ("0001_users.sql", "-- migrate:up\nCREATE TABLE users (id serial PRIMARY KEY);\n"),
            ("0002_cats.sql", "-- migrate:up\nCREATE TABLE cats (id serial PRIMARY KEY);\n"),
        ] {
            std::fs::write(dir.join(name), content).unwrap();
        }

        let on_disk =
            SqlDirMigrator::new(SqlDirOptions::new().fs(OsFs::rooted(tmp.path()))).unwrap();
        let in_memory = SqlDirMigrator::new(SqlDirOptions::new().fs(fs())).unwrap();
        assert_eq!(on_disk.hash().unwrap(), in_memory.hash().unwrap());
    }

    #[test]
    fn test_hash_missing_dir() {
        let migrator =
            SqlDirMigrator::new(SqlDirOptions::new().fs(MemoryFs::new()).dir("nowhere")).unwrap();
        assert!(matches!(migrator.hash(), Err(MigratorError::Io { .. })));
    }

    #[test]
    fn test_engine_uses_config() {
        let migrator = SqlDirMigrator::new(SqlDirOptions::new().fs(fs())).unwrap();
        let config = Config::builder()
            .database("tpl_xyz")
            .options("sslmode=disable&application_name=pgstamp")
            .build()
            .unwrap();
        let engine = migrator.engine(&config).unwrap();
        assert_eq!(engine.config(), &config);
        assert_eq!(engine.migrations().unwrap().len(), 2);
    }
}
