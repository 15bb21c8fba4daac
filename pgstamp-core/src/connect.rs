//! Opening engine-owned connections.

use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::MigratorResult;

/// Connect to the database described by `config`.
///
/// The connection driver runs on a spawned task that ends when the returned
/// client is dropped.
pub async fn connect(config: &Config) -> MigratorResult<Client> {
    let (client, connection) = tokio_postgres::connect(&config.url(), NoTls).await?;

    let database = config.database().to_string();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!(database = %database, error = %e, "Connection error");
        }
    });

    debug!(host = %config.host(), database = %config.database(), "Connected");
    Ok(client)
}
