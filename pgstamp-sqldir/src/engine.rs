//! In-process migration engine for SQL directories.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use pgstamp_core::{
    Config, MigrationFs, MigratorError, MigratorResult, connect, escape_ident, quote_qualified,
};
use tokio_postgres::Client;
use tokio_postgres::error::SqlState;
use tracing::{debug, info};

use crate::migration::{SqlMigration, discover};

/// Database used to create the target when it does not exist yet.
const MAINTENANCE_DATABASE: &str = "postgres";

/// A migration engine bound to one database URL.
///
/// Unlike the atlas migrators nothing is spawned: statements run in-process
/// on connections the engine opens itself.
#[derive(Debug, Clone)]
pub struct SqlDirEngine {
    config: Config,
    dirs: Vec<String>,
    table: String,
    fs: Arc<dyn MigrationFs>,
}

impl SqlDirEngine {
    /// Create an engine for the database described by `config`.
    pub fn new(
        config: Config,
        dirs: Vec<String>,
        table_name: &str,
        fs: Arc<dyn MigrationFs>,
    ) -> MigratorResult<Self> {
        Ok(Self {
            config,
            dirs,
            table: quote_qualified(table_name)?,
            fs,
        })
    }

    /// The target database.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every migration file in the configured directories, by version.
    pub fn migrations(&self) -> MigratorResult<Vec<SqlMigration>> {
        discover(self.fs.as_ref(), &self.dirs)
    }

    /// Create the target database if it is missing.
    ///
    /// Returns `true` when the database was created.
    pub async fn create_database_if_absent(&self) -> MigratorResult<bool> {
        let name = self.config.database();
        let admin = connect(&self.config.with_database(MAINTENANCE_DATABASE)?).await?;

        let exists = admin
            .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&name])
            .await?
            .is_some();
        if exists {
            debug!(database = %name, "Database already exists");
            return Ok(false);
        }

        match admin
            .batch_execute(&format!("CREATE DATABASE {}", escape_ident(name)))
            .await
        {
            Ok(()) => {
                info!(database = %name, "Created database");
                Ok(true)
            }
            // Someone else created it between the check and here.
            Err(e) if e.code() == Some(&SqlState::DUPLICATE_DATABASE) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply every pending migration, returning the versions applied.
    pub async fn migrate(&self) -> MigratorResult<Vec<String>> {
        let migrations = self.migrations()?;
        let mut client = connect(&self.config).await?;

        self.ensure_table(&client).await?;
        let applied: HashSet<String> = self
            .applied_versions_with(&client)
            .await?
            .into_iter()
            .collect();

        let mut newly_applied = Vec::new();
        for migration in migrations.iter().filter(|m| !applied.contains(&m.version)) {
            let start = Instant::now();
            info!(version = %migration.version, file = %migration.path, "Applying migration");
            self.apply(&mut client, migration)
                .await
                .map_err(|source| MigratorError::MigrationFailed {
                    id: migration.path.clone(),
                    source,
                })?;
            debug!(
                version = %migration.version,
                duration_ms = start.elapsed().as_millis() as u64,
                "Applied migration"
            );
            newly_applied.push(migration.version.clone());
        }

        if newly_applied.is_empty() {
            debug!(database = %self.config.database(), "No pending migrations");
        }
        Ok(newly_applied)
    }

    /// Create the database if absent, then apply every pending migration.
    pub async fn create_and_migrate(&self) -> MigratorResult<Vec<String>> {
        self.create_database_if_absent().await?;
        self.migrate().await
    }

    /// Versions recorded in the tracking table.
    pub async fn applied_versions(&self) -> MigratorResult<Vec<String>> {
        let client = connect(&self.config).await?;
        self.applied_versions_with(&client).await
    }

    async fn applied_versions_with(&self, client: &Client) -> MigratorResult<Vec<String>> {
        let rows = client
            .query(&format!("SELECT version FROM {} ORDER BY version", self.table), &[])
            .await?;
        rows.iter()
            .map(|row| -> MigratorResult<String> { Ok(row.try_get(0)?) })
            .collect()
    }

    async fn ensure_table(&self, client: &Client) -> MigratorResult<()> {
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {} (version varchar(255) PRIMARY KEY)",
                self.table
            ))
            .await?;
        Ok(())
    }

    async fn apply(
        &self,
        client: &mut Client,
        migration: &SqlMigration,
    ) -> Result<(), tokio_postgres::Error> {
        let insert = format!("INSERT INTO {} (version) VALUES ($1)", self.table);

        if migration.transaction {
            let tx = client.transaction().await?;
            if !migration.up.trim().is_empty() {
                tx.batch_execute(&migration.up).await?;
            }
            tx.execute(&insert, &[&migration.version]).await?;
            tx.commit().await?;
        } else {
            if !migration.up.trim().is_empty() {
                client.batch_execute(&migration.up).await?;
            }
            client.execute(&insert, &[&migration.version]).await?;
        }
        Ok(())
    }
}
