//! `minidock ps`: List containers.

use minidock_runtime::Engine;

use crate::output;

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub fn execute(engine: &Engine) -> anyhow::Result<()> {
    let containers = engine.list().map_err(|e| anyhow::anyhow!("{e}"))?;
    print!("{}", output::container_table(&containers));
    Ok(())
}
