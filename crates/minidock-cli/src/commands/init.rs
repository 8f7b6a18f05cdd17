//! `minidock init`: PID 1 of a new container. Internal.

use minidock_runtime::init::run_container_init;

/// Executes the `init` command.
///
/// Only returns on failure; on success the process image is replaced by
/// the user command.
///
/// # Errors
///
/// Returns an error if the container environment cannot be set up or the
/// user command cannot be executed.
pub fn execute() -> anyhow::Result<()> {
    tracing::debug!("container init starting");
    match run_container_init() {
        Ok(never) => match never {},
        Err(e) => {
            tracing::error!(error = %e, "container init failed");
            Err(anyhow::anyhow!("{e}"))
        }
    }
}
