//! Invocation settings shared by the atlas migrators.

use std::time::Duration;

use pgstamp_core::{MigratorResult, execute_with_timeout};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Name of the atlas executable looked up on `$PATH`.
pub const DEFAULT_BINARY: &str = "atlas";

/// How to run the atlas CLI.
#[derive(Debug, Clone)]
pub(crate) struct AtlasCli {
    pub(crate) binary: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) cancel: CancellationToken,
}

impl Default for AtlasCli {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl AtlasCli {
    pub(crate) async fn run(&self, args: &[String]) -> MigratorResult<()> {
        // args[0..2] is the subcommand, never the URL (which holds the password)
        info!(
            binary = %self.binary,
            command = %args.iter().take(2).cloned().collect::<Vec<_>>().join(" "),
            "Running atlas"
        );
        execute_with_timeout(&self.cancel, self.timeout, None, &self.binary, args).await?;
        Ok(())
    }
}
