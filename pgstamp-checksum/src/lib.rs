//! # pgstamp-checksum
//!
//! A migrator that records the SHA-256 of every migration it applies and
//! can later verify the database against the current source.
//!
//! Migrations are the `*.sql` files directly inside one directory. Each is
//! identified by its file name without extension and applied in lexical
//! order, each in its own transaction.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgstamp_checksum::{ChecksumMigrator, ChecksumOptions};
//! use pgstamp_core::OsFs;
//!
//! let migrator = ChecksumMigrator::new(
//!     &OsFs::new(),
//!     "migrations",
//!     ChecksumOptions::new().table_name("public.pgmigrate_migrations"),
//! )?;
//! ```

pub mod engine;
pub mod logger;
pub mod migration;
pub mod migrator;

pub use engine::{AppliedMigration, ChecksumEngine, VerificationFailure};
pub use logger::{LogField, LogLevel, MigrationLogger, TracingLogger};
pub use migration::{Migration, compute_checksum, load};
pub use migrator::{ChecksumMigrator, ChecksumOptions, DEFAULT_TABLE_NAME};
