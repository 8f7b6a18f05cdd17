//! `minidock stop`: Stop a running container.

use clap::Args;
use minidock_runtime::Engine;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the container is unknown, not running, or cannot be
/// signalled.
pub fn execute(args: StopArgs, engine: &Engine) -> anyhow::Result<()> {
    engine
        .stop(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))
}
