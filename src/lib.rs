//! # pgstamp
//!
//! Migration backends for PostgreSQL test harnesses that keep one
//! fully-migrated template database per migration state.
//!
//! Every backend implements [`Migrator`]:
//! - `hash` returns a [`Fingerprint`] of everything that affects the
//!   migrated schema, used as the template's cache key
//! - `prepare`, `migrate` and `verify` run against a fresh template
//!
//! Backends, each behind a feature of the same name (all on by default):
//! - [`atlas`]: the `atlas` CLI, over a migrations directory or a
//!   declarative schema file
//! - [`sqldir`]: an in-process engine for directories of versioned SQL files
//! - [`checksum`]: an in-process engine that records and verifies a
//!   checksum per applied migration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pgstamp::prelude::*;
//! use pgstamp::sqldir::{SqlDirMigrator, SqlDirOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), MigratorError> {
//!     let migrator = SqlDirMigrator::new(SqlDirOptions::new().dir("db/migrations"))?;
//!     let hash = migrator.hash()?;
//!
//!     let config = Config::builder()
//!         .database(format!("tpl_{}", &hash.as_str()[..16]))
//!         .build()?;
//!     let client = pgstamp::connect(&config).await?;
//!     migrator.prepare(&client, &config).await?;
//!     migrator.migrate(&client, &config).await?;
//!     migrator.verify(&client, &config).await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use pgstamp_core::*;

/// Migrators backed by the `atlas` CLI.
#[cfg(feature = "atlas")]
#[cfg_attr(docsrs, doc(cfg(feature = "atlas")))]
pub mod atlas {
    pub use pgstamp_atlas::*;
}

/// In-process migrator for directories of versioned SQL files.
#[cfg(feature = "sqldir")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqldir")))]
pub mod sqldir {
    pub use pgstamp_sqldir::*;
}

/// In-process migrator with per-migration checksum tracking.
#[cfg(feature = "checksum")]
#[cfg_attr(docsrs, doc(cfg(feature = "checksum")))]
pub mod checksum {
    pub use pgstamp_checksum::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use pgstamp_core::prelude::*;

    #[cfg(feature = "atlas")]
    pub use crate::atlas::{AtlasDirMigrator, AtlasSchemaMigrator};
    #[cfg(feature = "checksum")]
    pub use crate::checksum::{ChecksumMigrator, ChecksumOptions};
    #[cfg(feature = "sqldir")]
    pub use crate::sqldir::{SqlDirMigrator, SqlDirOptions};
}
