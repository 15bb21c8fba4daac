//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use pgstamp::tokio_postgres::Client;
use pgstamp::{Config, connect, escape_ident};

/// Server used by the database tests. They are skipped when unset.
pub const DATABASE_URL_ENV: &str = "PGSTAMP_TEST_DATABASE_URL";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("migrations")
}

/// Copy the fixture migrations to `<tmp>/migrations`.
pub fn copy_fixtures() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("migrations");
    std::fs::create_dir_all(&dir).unwrap();
    for entry in std::fs::read_dir(fixtures_dir()).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), dir.join(entry.file_name())).unwrap();
    }
    tmp
}

pub fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

/// Connection settings from the environment, or `None` to skip.
pub fn base_config() -> Option<Config> {
    match std::env::var(DATABASE_URL_ENV) {
        Ok(url) => Some(Config::from_url(&url).expect("invalid test database URL")),
        Err(_) => {
            eprintln!("skipping: {} is not set", DATABASE_URL_ENV);
            None
        }
    }
}

/// `base` pointed at a database name no other test uses.
pub fn unique_config(base: &Config) -> Config {
    let name = format!("pgstamp_test_{}", uuid::Uuid::new_v4().simple());
    base.with_database(name).unwrap()
}

async fn admin(config: &Config) -> Client {
    connect(&config.with_database("postgres").unwrap())
        .await
        .unwrap()
}

/// Create the database named by `config` and connect to it.
pub async fn create_database(config: &Config) -> Client {
    admin(config)
        .await
        .batch_execute(&format!("CREATE DATABASE {}", escape_ident(config.database())))
        .await
        .unwrap();
    connect(config).await.unwrap()
}

pub async fn drop_database(config: &Config) {
    let result = admin(config)
        .await
        .batch_execute(&format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            escape_ident(config.database())
        ))
        .await;
    if let Err(e) = result {
        eprintln!("failed to drop {}: {}", config.database(), e);
    }
}
