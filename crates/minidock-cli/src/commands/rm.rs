//! `minidock rm`: Remove a stopped container.

use clap::Args;
use minidock_runtime::Engine;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if the container is unknown, still running, or its
/// record cannot be deleted.
pub fn execute(args: RmArgs, engine: &Engine) -> anyhow::Result<()> {
    engine
        .remove(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))
}
