//! # pgstamp-atlas
//!
//! Migrators backed by the [atlas](https://atlasgo.io) CLI.
//!
//! Both shell out to `atlas`, as its maintainers recommend, and report
//! failures with atlas' own diagnostic output:
//!
//! - [`AtlasDirMigrator`]: `atlas migrate apply` over a versioned
//!   migrations directory
//! - [`AtlasSchemaMigrator`]: `atlas schema apply` against a single
//!   declarative schema file
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use pgstamp_atlas::AtlasDirMigrator;
//! use pgstamp_core::Migrator;
//!
//! let migrator = AtlasDirMigrator::new("./migrations")
//!     .with_timeout(Duration::from_secs(60));
//! let key = migrator.hash()?;
//! ```

mod cli;
pub mod dir;
pub mod schema;

pub use cli::DEFAULT_BINARY;
pub use dir::AtlasDirMigrator;
pub use schema::AtlasSchemaMigrator;
