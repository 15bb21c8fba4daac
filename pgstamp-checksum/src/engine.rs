//! Applies migrations and records a checksum for each one.
//!
//! The tracking table has one row per applied migration:
//!
//! | column                     | type          |
//! |----------------------------|---------------|
//! | `id`                       | `TEXT` (PK)   |
//! | `checksum`                 | `TEXT`        |
//! | `execution_time_in_millis` | `BIGINT`      |
//! | `applied_at`               | `TIMESTAMPTZ` |

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use pgstamp_core::{MigratorError, MigratorResult, quote_ident, quote_qualified};
use tokio_postgres::Client;
use tracing::{debug, warn};

use crate::logger::{LogField, LogLevel, MigrationLogger};
use crate::migration::Migration;

/// A row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Migration id.
    pub id: String,
    /// Checksum of the SQL when it was applied.
    pub checksum: String,
    /// How long the SQL took to run.
    pub execution_time_in_millis: i64,
    /// When the migration was recorded.
    pub applied_at: DateTime<Utc>,
}

/// One inconsistency between the source and the tracking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFailure {
    /// Migration the failure is about.
    pub id: String,
    /// Human-readable description.
    pub message: String,
}

impl VerificationFailure {
    fn new(id: &str, message: String) -> Self {
        Self {
            id: id.to_string(),
            message,
        }
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Migration engine that tracks a checksum per applied migration.
#[derive(Debug, Clone)]
pub struct ChecksumEngine {
    migrations: Vec<Migration>,
    table_name: String,
    table: String,
    logger: Option<Arc<dyn MigrationLogger>>,
}

impl ChecksumEngine {
    /// Create an engine over `migrations`, applied in the order given.
    ///
    /// Without a `logger` progress is only emitted as `tracing` debug events.
    pub fn new(
        migrations: Vec<Migration>,
        table_name: impl Into<String>,
        logger: Option<Arc<dyn MigrationLogger>>,
    ) -> MigratorResult<Self> {
        let table_name = table_name.into();
        let table = quote_qualified(&table_name)?;

        let mut seen = HashSet::new();
        if let Some(duplicate) = migrations.iter().find(|m| !seen.insert(m.id.as_str())) {
            return Err(MigratorError::invalid_migration(format!(
                "duplicate migration id '{}'",
                duplicate.id
            )));
        }

        Ok(Self {
            migrations,
            table_name,
            table,
            logger,
        })
    }

    /// Migrations known to this engine, in apply order.
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Unquoted tracking table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Migrations that still need to run, given what has been applied.
    pub fn plan(&self, applied: &[AppliedMigration]) -> Vec<&Migration> {
        let applied: HashSet<&str> = applied.iter().map(|a| a.id.as_str()).collect();
        self.migrations
            .iter()
            .filter(|m| !applied.contains(m.id.as_str()))
            .collect()
    }

    /// Compare the tracking table against the source.
    ///
    /// Every inconsistency is returned, not just the first:
    /// - an applied migration whose SQL has changed since
    /// - an applied migration that is no longer in the source
    /// - a migration in the source that was never applied
    pub fn check(&self, applied: &[AppliedMigration]) -> Vec<VerificationFailure> {
        let current: HashMap<&str, &Migration> = self
            .migrations
            .iter()
            .map(|m| (m.id.as_str(), m))
            .collect();

        let mut failures = Vec::new();
        for record in applied {
            match current.get(record.id.as_str()) {
                Some(migration) => {
                    let checksum = migration.checksum();
                    if checksum != record.checksum {
                        failures.push(VerificationFailure::new(
                            &record.id,
                            format!(
                                "migration '{}' has changed since it was applied \
                                 (recorded checksum {}, current checksum {})",
                                record.id, record.checksum, checksum
                            ),
                        ));
                    }
                }
                None => failures.push(VerificationFailure::new(
                    &record.id,
                    format!(
                        "migration '{}' was applied but is missing from the source",
                        record.id
                    ),
                )),
            }
        }

        for migration in self.plan(applied) {
            failures.push(VerificationFailure::new(
                &migration.id,
                format!("migration '{}' has not been applied", migration.id),
            ));
        }
        failures
    }

    /// Apply every pending migration, each in its own transaction.
    ///
    /// Returns the ids applied by this call.
    pub async fn migrate(&self, client: &Client) -> MigratorResult<Vec<String>> {
        self.ensure_table(client).await?;

        let applied = self.applied(client).await?;
        let pending = self.plan(&applied);
        self.log(
            LogLevel::Info,
            "migrating",
            &[
                LogField::new("table", &self.table_name),
                LogField::new("applied", applied.len()),
                LogField::new("pending", pending.len()),
            ],
        );

        let mut newly_applied = Vec::with_capacity(pending.len());
        for migration in pending {
            let elapsed = match self.apply_one(client, migration).await {
                Ok(elapsed) => elapsed,
                Err(source) => {
                    self.log(
                        LogLevel::Error,
                        "migration failed",
                        &[
                            LogField::new("id", &migration.id),
                            LogField::new("error", &source),
                        ],
                    );
                    return Err(MigratorError::MigrationFailed {
                        id: migration.id.clone(),
                        source,
                    });
                }
            };
            self.log(
                LogLevel::Info,
                "applied migration",
                &[
                    LogField::new("id", &migration.id),
                    LogField::new("execution_time_in_millis", elapsed),
                ],
            );
            newly_applied.push(migration.id.clone());
        }
        Ok(newly_applied)
    }

    /// Rows of the tracking table, oldest first. Empty if the table does
    /// not exist yet.
    pub async fn applied(&self, client: &Client) -> MigratorResult<Vec<AppliedMigration>> {
        if !self.table_exists(client).await? {
            return Ok(Vec::new());
        }

        let rows = client
            .query(
                &format!(
                    "SELECT id, checksum, execution_time_in_millis, applied_at \
                     FROM {} ORDER BY applied_at, id",
                    self.table
                ),
                &[],
            )
            .await?;

        rows.iter()
            .map(|row| -> MigratorResult<AppliedMigration> {
                Ok(AppliedMigration {
                    id: row.try_get(0)?,
                    checksum: row.try_get(1)?,
                    execution_time_in_millis: row.try_get(2)?,
                    applied_at: row.try_get(3)?,
                })
            })
            .collect()
    }

    /// Read the tracking table and [`check`](Self::check) it.
    pub async fn verify(&self, client: &Client) -> MigratorResult<Vec<VerificationFailure>> {
        let applied = self.applied(client).await?;
        let failures = self.check(&applied);
        for failure in &failures {
            self.log(
                LogLevel::Error,
                &failure.message,
                &[LogField::new("id", &failure.id)],
            );
        }
        Ok(failures)
    }

    async fn apply_one(
        &self,
        client: &Client,
        migration: &Migration,
    ) -> Result<i64, tokio_postgres::Error> {
        let insert = format!(
            "INSERT INTO {} (id, checksum, execution_time_in_millis) VALUES ($1, $2, $3)",
            self.table
        );

        client.batch_execute("BEGIN").await?;
        let result: Result<i64, tokio_postgres::Error> = async {
            let start = Instant::now();
            client.batch_execute(&migration.sql).await?;
            let elapsed = start.elapsed().as_millis() as i64;
            client
                .execute(&insert, &[&migration.id, &migration.checksum(), &elapsed])
                .await?;
            Ok(elapsed)
        }
        .await;

        match result {
            Ok(elapsed) => {
                client.batch_execute("COMMIT").await?;
                Ok(elapsed)
            }
            Err(e) => {
                if let Err(rollback) = client.batch_execute("ROLLBACK").await {
                    warn!(id = %migration.id, error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn ensure_table(&self, client: &Client) -> MigratorResult<()> {
        if let Some((schema, _)) = self.table_name.split_once('.') {
            if schema != "public" {
                client
                    .batch_execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)?))
                    .await?;
            }
        }
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    checksum TEXT NOT NULL,
                    execution_time_in_millis BIGINT NOT NULL,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )",
                self.table
            ))
            .await?;
        Ok(())
    }

    async fn table_exists(&self, client: &Client) -> MigratorResult<bool> {
        // The quoted name only contains validated identifier characters.
        let row = client
            .query_one(
                &format!("SELECT to_regclass('{}') IS NOT NULL", self.table),
                &[],
            )
            .await?;
        Ok(row.try_get(0)?)
    }

    fn log(&self, level: LogLevel, message: &str, fields: &[LogField]) {
        match &self.logger {
            Some(logger) => logger.log(level, message, fields),
            None => debug!(%level, "{}", message),
        }
    }
}
