//! The migrator contract consumed by template-database managers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::Client;

use crate::config::Config;
use crate::error::MigratorResult;
use crate::hash::{Fingerprint, RecursiveHash};

/// A migration backend.
///
/// A template manager calls [`Migrator::hash`] to get a cache key. On a
/// cache miss it creates an empty database and calls [`Migrator::prepare`],
/// [`Migrator::migrate`] and [`Migrator::verify`] against it, in that order.
///
/// `hash` is pure and may be called concurrently. The other operations
/// perform no locking; callers must not run two sequences against the same
/// database at once, and nothing is retried internally.
///
/// `prepare` and `verify` are optional capabilities. Backends without them
/// implement them as explicit no-ops, so a clean return means "nothing was
/// checked", not "checked and passed".
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Fingerprint of the schema state `migrate` would produce.
    ///
    /// Covers every migration source and every configuration field that
    /// changes the applied result. Fails only on I/O errors.
    fn hash(&self) -> MigratorResult<Fingerprint>;

    /// Pre-migration setup.
    async fn prepare(&self, client: &Client, config: &Config) -> MigratorResult<()>;

    /// Apply all migrations to a freshly created, empty database.
    ///
    /// Running it twice against the same database is not guaranteed to work.
    async fn migrate(&self, client: &Client, config: &Config) -> MigratorResult<()>;

    /// Post-migration consistency check.
    async fn verify(&self, client: &Client, config: &Config) -> MigratorResult<()>;
}

#[async_trait]
impl<M: Migrator + ?Sized> Migrator for Box<M> {
    fn hash(&self) -> MigratorResult<Fingerprint> {
        (**self).hash()
    }

    async fn prepare(&self, client: &Client, config: &Config) -> MigratorResult<()> {
        (**self).prepare(client, config).await
    }

    async fn migrate(&self, client: &Client, config: &Config) -> MigratorResult<()> {
        (**self).migrate(client, config).await
    }

    async fn verify(&self, client: &Client, config: &Config) -> MigratorResult<()> {
        (**self).verify(client, config).await
    }
}

#[async_trait]
impl<M: Migrator + ?Sized> Migrator for Arc<M> {
    fn hash(&self) -> MigratorResult<Fingerprint> {
        (**self).hash()
    }

    async fn prepare(&self, client: &Client, config: &Config) -> MigratorResult<()> {
        (**self).prepare(client, config).await
    }

    async fn migrate(&self, client: &Client, config: &Config) -> MigratorResult<()> {
        (**self).migrate(client, config).await
    }

    async fn verify(&self, client: &Client, config: &Config) -> MigratorResult<()> {
        (**self).verify(client, config).await
    }
}

/// A migrator that does nothing.
///
/// Every instance shares one fingerprint, so all users of a `NoopMigrator`
/// share one empty template.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMigrator;

#[async_trait]
impl Migrator for NoopMigrator {
    fn hash(&self) -> MigratorResult<Fingerprint> {
        Ok(RecursiveHash::new().with_field("Migrator", "noop").finish())
    }

    /// No-op.
    async fn prepare(&self, _client: &Client, _config: &Config) -> MigratorResult<()> {
        Ok(())
    }

    /// No-op.
    async fn migrate(&self, _client: &Client, _config: &Config) -> MigratorResult<()> {
        Ok(())
    }

    /// No-op.
    async fn verify(&self, _client: &Client, _config: &Config) -> MigratorResult<()> {
        Ok(())
    }
}
