//! The checksum-tracking [`Migrator`].

use std::sync::Arc;

use async_trait::async_trait;
use pgstamp_core::{
    Config, Fingerprint, MigrationFs, Migrator, MigratorResult, RecursiveHash, VerificationErrors,
};
use tokio_postgres::Client;

use crate::engine::ChecksumEngine;
use crate::logger::MigrationLogger;
use crate::migration::{Migration, load};

/// Default tracking table.
pub const DEFAULT_TABLE_NAME: &str = "public.pgmigrate_migrations";

/// Options for [`ChecksumMigrator`]. Setting a field twice keeps the last
/// value.
#[derive(Debug, Clone, Default)]
pub struct ChecksumOptions {
    table_name: Option<String>,
    logger: Option<Arc<dyn MigrationLogger>>,
}

impl ChecksumOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracking table, optionally schema-qualified
    /// (default `public.pgmigrate_migrations`).
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Where engine progress is reported. Unset, progress only appears as
    /// `tracing` debug events; pass [`TracingLogger`](crate::TracingLogger)
    /// to see it at info level.
    pub fn logger(self, logger: impl MigrationLogger + 'static) -> Self {
        self.shared_logger(Arc::new(logger))
    }

    /// [`ChecksumOptions::logger`] for an already shared sink.
    pub fn shared_logger(mut self, logger: Arc<dyn MigrationLogger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

/// A [`Migrator`] that records the checksum of every applied migration and
/// checks them in `verify`.
///
/// Migrations are loaded once, when the migrator is created.
#[derive(Debug, Clone)]
pub struct ChecksumMigrator {
    engine: ChecksumEngine,
}

impl ChecksumMigrator {
    /// Load every `*.sql` file directly inside `dir` of `fs`.
    pub fn new(fs: &dyn MigrationFs, dir: &str, options: ChecksumOptions) -> MigratorResult<Self> {
        Self::from_migrations(load(fs, dir)?, options)
    }

    /// Use an explicit list of migrations, applied in the order given.
    pub fn from_migrations(
        migrations: Vec<Migration>,
        options: ChecksumOptions,
    ) -> MigratorResult<Self> {
        let table_name = options
            .table_name
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
        Ok(Self {
            engine: ChecksumEngine::new(migrations, table_name, options.logger)?,
        })
    }

    /// The underlying engine.
    pub fn engine(&self) -> &ChecksumEngine {
        &self.engine
    }
}

#[async_trait]
impl Migrator for ChecksumMigrator {
    fn hash(&self) -> MigratorResult<Fingerprint> {
        let mut hash = RecursiveHash::new().with_field("TableName", self.engine.table_name());
        for migration in self.engine.migrations() {
            hash.add(&migration.id, &migration.sql);
        }
        Ok(hash.finish())
    }

    /// No-op.
    async fn prepare(&self, _client: &Client, _config: &Config) -> MigratorResult<()> {
        Ok(())
    }

    async fn migrate(&self, client: &Client, _config: &Config) -> MigratorResult<()> {
        self.engine.migrate(client).await?;
        Ok(())
    }

    /// Fails with every inconsistency found, in one
    /// [`MigratorError::Verification`](pgstamp_core::MigratorError::Verification).
    async fn verify(&self, client: &Client, _config: &Config) -> MigratorResult<()> {
        let failures = self.engine.verify(client).await?;
        failures
            .into_iter()
            .map(|f| f.message)
            .collect::<VerificationErrors>()
            .into_result()
    }
}
