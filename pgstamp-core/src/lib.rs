//! # pgstamp-core
//!
//! The contract between a template-database manager and the migration
//! backends it drives.
//!
//! A template manager keeps one fully-migrated template database per
//! distinct migration state and clones it for every test. To know which
//! template to use it asks the backend for a [`Fingerprint`]: two sources
//! produce the same fingerprint exactly when their contributing bytes are
//! identical.
//!
//! This crate provides:
//! - The [`Migrator`] trait (`hash`, `prepare`, `migrate`, `verify`)
//! - [`RecursiveHash`], the fingerprint accumulator
//! - [`MigrationFs`] sources for disk, memory and embedded bundles
//! - [`execute`], scoped subprocess execution with cancellation
//! - [`Config`], the connection configuration every backend receives
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgstamp_core::{MemoryFs, RecursiveHash};
//!
//! let fs = MemoryFs::new()
//!     .with_file("migrations/0001_users.sql", "create table users (id int);");
//!
//! let mut hash = RecursiveHash::new().with_field("TableName", "schema_migrations");
//! hash.add_dir(&fs, "*.sql", "migrations")?;
//! println!("template key: {}", hash.finish());
//! ```

pub mod config;
pub mod connect;
pub mod error;
pub mod exec;
pub mod fs;
pub mod hash;
pub mod ident;
pub mod migrator;

// Re-exports
pub use config::{Config, ConfigBuilder};
pub use connect::connect;
pub use error::{MigratorError, MigratorResult, VerificationErrors};
pub use exec::{execute, execute_with_timeout};
#[cfg(feature = "embed")]
pub use fs::EmbeddedFs;
pub use fs::{FsEntry, MemoryFs, MigrationFs, OsFs, join_path, normalize_path};
pub use hash::{Fingerprint, RecursiveHash};
pub use ident::{escape_ident, quote_ident, quote_qualified};
pub use migrator::{Migrator, NoopMigrator};

// Re-exported so backends and callers agree on the exact versions.
pub use async_trait::async_trait;
pub use tokio_postgres;
pub use tokio_util::sync::CancellationToken;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{MigratorError, MigratorResult};
    pub use crate::fs::{MemoryFs, MigrationFs, OsFs};
    pub use crate::hash::{Fingerprint, RecursiveHash};
    pub use crate::migrator::{Migrator, NoopMigrator};
}
