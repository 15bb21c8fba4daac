//! # pgstamp-sqldir
//!
//! A migrator for directories of versioned `*.sql` files, applied by an
//! in-process engine over `tokio-postgres`. No external binary is needed.
//!
//! Files are named `<version>_<description>.sql` and split into
//! `-- migrate:up` / `-- migrate:down` sections. Applied versions are
//! recorded in a tracking table (`schema_migrations` by default).
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgstamp_core::{Migrator, OsFs};
//! use pgstamp_sqldir::{SqlDirMigrator, SqlDirOptions};
//!
//! let migrator = SqlDirMigrator::new(
//!     SqlDirOptions::new()
//!         .dirs(["db/migrations", "db/seeds"])
//!         .table_name("schema_migrations")
//!         .fs(OsFs::rooted(env!("CARGO_MANIFEST_DIR"))),
//! )?;
//! let key = migrator.hash()?;
//! ```

pub mod engine;
pub mod migration;
pub mod migrator;

pub use engine::SqlDirEngine;
pub use migration::SqlMigration;
pub use migrator::{DEFAULT_DIR, DEFAULT_TABLE_NAME, SqlDirMigrator, SqlDirOptions};
