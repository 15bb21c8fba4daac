//! Scoped invocation of external programs.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MigratorError, MigratorResult};

/// Run `program` with `args` and return its standard output.
///
/// Standard error is captured for diagnostics. A non-zero exit produces
/// [`MigratorError::CommandFailed`] carrying that output (or standard
/// output, when the program wrote nothing to standard error).
///
/// The child is spawned with `kill_on_drop`, so it is terminated both when
/// `cancel` fires and when the returned future is dropped early.
pub async fn execute<S: AsRef<str>>(
    cancel: &CancellationToken,
    stdin: Option<&[u8]>,
    program: &str,
    args: &[S],
) -> MigratorResult<String> {
    let mut command = Command::new(program);
    command
        .args(args.iter().map(AsRef::as_ref))
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program = %program, args = args.len(), "Spawning command");

    let mut child = command.spawn().map_err(|source| MigratorError::Launch {
        program: program.to_string(),
        source,
    })?;

    // Feed stdin from its own task so a chatty child cannot deadlock on a
    // full stdout pipe while we are still writing.
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        let input = input.to_vec();
        let name = program.to_string();
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&input).await {
                warn!(program = %name, error = %e, "Failed to write command stdin");
            }
        });
    }

    let output = tokio::select! {
        output = child.wait_with_output() => output.map_err(|source| MigratorError::Launch {
            program: program.to_string(),
            source,
        })?,
        _ = cancel.cancelled() => {
            debug!(program = %program, "Command cancelled, terminating child");
            return Err(MigratorError::Cancelled {
                program: program.to_string(),
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let diagnostics = if stderr.trim().is_empty() {
            stdout
        } else {
            stderr
        };
        return Err(MigratorError::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: diagnostics.trim_end().to_string(),
        });
    }

    Ok(stdout)
}

/// [`execute`] with an upper bound on run time.
///
/// When the deadline passes the child is terminated and
/// [`MigratorError::TimedOut`] is returned.
pub async fn execute_with_timeout<S: AsRef<str>>(
    cancel: &CancellationToken,
    timeout: Option<Duration>,
    stdin: Option<&[u8]>,
    program: &str,
    args: &[S],
) -> MigratorResult<String> {
    let run = execute(cancel, stdin, program, args);
    match timeout {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .map_err(|_| MigratorError::TimedOut {
                program: program.to_string(),
                timeout_ms: limit.as_millis() as u64,
            })?,
        None => run.await,
    }
}
