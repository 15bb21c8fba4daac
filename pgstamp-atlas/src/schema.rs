//! Declarative schema files applied with `atlas schema apply`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use pgstamp_core::{
    Config, Fingerprint, MigrationFs, Migrator, MigratorError, MigratorResult, OsFs,
    RecursiveHash,
};
use tokio_postgres::Client;
use tokio_util::sync::CancellationToken;

use crate::cli::AtlasCli;

/// A [`Migrator`] that runs
///
/// ```text
/// atlas schema apply --auto-approve --url $DB --to file://$schema
/// ```
///
/// Auto-approval is safe here because the target is always a disposable
/// template database. The whole schema is reconciled in one pass, so no
/// migration history table is created.
///
/// `prepare` and `verify` are no-ops.
#[derive(Debug, Clone)]
pub struct AtlasSchemaMigrator {
    schema_file: PathBuf,
    cli: AtlasCli,
}

impl AtlasSchemaMigrator {
    /// Create a migrator for a schema definition file.
    pub fn new(schema_file: impl Into<PathBuf>) -> Self {
        Self {
            schema_file: schema_file.into(),
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

    /// The schema definition file.
    pub fn schema_file(&self) -> &Path {
        &self.schema_file
    }

    /// Arguments passed to atlas for `config`.
    pub fn args(&self, config: &Config) -> Vec<String> {
        vec![
            "schema".to_string(),
            "apply".to_string(),
            "--auto-approve".to_string(),
            "--url".to_string(),
            config.url(),
            "--to".to_string(),
            format!("file://{}", self.schema_file.display()),
        ]
    }

    /// Run atlas against the database described by `config`.
    pub async fn apply(&self, config: &Config) -> MigratorResult<()> {
        self.cli.run(&self.args(config)).await
    }
}

#[async_trait]
impl Migrator for AtlasSchemaMigrator {
    /// Hash of the schema file, keyed by its file name so the fingerprint
    /// does not depend on where the file lives.
    fn hash(&self) -> MigratorResult<Fingerprint> {
        let path = self.schema_file.to_string_lossy();
        let content = OsFs::new()
            .read_file(&path)
            .map_err(|e| MigratorError::io(&*path, e))?;
        let name = self
            .schema_file
            .file_name()
            .map_or_else(|| path.clone(), |name| name.to_string_lossy());

        let mut hash = RecursiveHash::new();
        hash.add(&name, content);
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
