//! `minidock commit`: Save a container's filesystem as a new image.

use clap::Args;
use minidock_runtime::Engine;

/// Arguments for the `commit` command.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Container name.
    pub container: String,

    /// Name of the image to create.
    pub image: String,
}

/// Executes the `commit` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or the archive cannot be
/// written.
pub fn execute(args: CommitArgs, engine: &Engine) -> anyhow::Result<()> {
    let archive = engine
        .commit(&args.container, &args.image)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::info!(archive = %archive.display(), "image saved");
    Ok(())
}
