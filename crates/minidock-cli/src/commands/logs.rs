//! `minidock logs`: Print the output of a detached container.

use std::io::Write;

use clap::Args;
use minidock_runtime::Engine;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the container is not found or its log is unreadable.
pub fn execute(args: LogsArgs, engine: &Engine) -> anyhow::Result<()> {
    let logs = engine
        .logs(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(logs.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
