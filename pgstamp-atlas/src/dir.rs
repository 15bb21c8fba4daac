//! Versioned migration directories applied with `atlas migrate apply`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use pgstamp_core::{Config, Fingerprint, Migrator, MigratorResult, OsFs, RecursiveHash};
use tokio_postgres::Client;
use tokio_util::sync::CancellationToken;

use crate::cli::AtlasCli;

/// A [`Migrator`] that runs
///
/// ```text
/// atlas migrate apply --url $DB --dir file://$dir
/// ```
///
/// The `atlas` binary must be on `$PATH` (or set with
/// [`AtlasDirMigrator::with_binary`]).
///
/// `prepare` and `verify` are no-ops.
#[derive(Debug, Clone)]
pub struct AtlasDirMigrator {
    dir: PathBuf,
    cli: AtlasCli,
}

impl AtlasDirMigrator {
    /// Create a migrator for a migrations directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cli: AtlasCli::default(),
        }
    }

    /// Use a specific atlas executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.cli.binary = binary.into();
        self
    }

    /// Terminate atlas if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.cli.timeout = Some(timeout);
        self
    }

    /// Terminate atlas when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cli.cancel = token;
        self
    }

    /// The migrations directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Arguments passed to atlas for `config`.
    pub fn args(&self, config: &Config) -> Vec<String> {
        vec![
            "migrate".to_string(),
            "apply".to_string(),
            "--url".to_string(),
            config.url(),
            "--dir".to_string(),
            format!("file://{}", self.dir.display()),
        ]
    }

    /// Run atlas against the database described by `config`.
    pub async fn apply(&self, config: &Config) -> MigratorResult<()> {
        self.cli.run(&self.args(config)).await
    }
}

#[async_trait]
impl Migrator for AtlasDirMigrator {
    /// Hash of every file in the migrations directory, including `atlas.sum`.
    fn hash(&self) -> MigratorResult<Fingerprint> {
        let mut hash = RecursiveHash::new();
        hash.add_dir(&OsFs::new(), "*", &self.dir.to_string_lossy())?;
        Ok(hash.finish())
    }

    /// No-op.
    async fn prepare(&self, _client: &Client, _config: &Config) -> MigratorResult<()> {
        Ok(())
    }

    async fn migrate(&self, _client: &Client, config: &Config) -> MigratorResult<()> {
        self.apply(config).await
    }

    /// No-op.
    async fn verify(&self, _client: &Client, _config: &Config) -> MigratorResult<()> {
        Ok(())
    }
}
