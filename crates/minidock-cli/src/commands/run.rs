//! `minidock run`: Create and start a container.

use clap::Args;
use minidock_common::types::ResourceConfig;
use minidock_runtime::{Engine, RunOptions, RunOutcome};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Keep stdin open (implies a terminal).
    #[arg(short, long)]
    pub interactive: bool,

    /// Allocate a pseudo-terminal and wait for the container to exit.
    #[arg(short, long)]
    pub tty: bool,

    /// Run in the background (the default without -i/-t).
    #[arg(short, long, conflicts_with_all = ["interactive", "tty"])]
    pub detach: bool,

    /// Container name (defaults to the generated ID).
    #[arg(long)]
    pub name: Option<String>,

    /// CPU quota in percent of one CPU.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub cpu: u32,

    /// Relative CPU weight (cpu.shares).
    #[arg(long, default_value = "")]
    pub cpushare: String,

    /// CPUs the container may run on, e.g. `0-1`.
    #[arg(long, default_value = "")]
    pub cpuset: String,

    /// Memory limit, e.g. `100m`.
    #[arg(long, default_value = "")]
    pub mem: String,

    /// Bind a host directory, `host:container`.
    #[arg(short, long, default_value = "")]
    pub volume: String,

    /// Image to run.
    pub image: String,

    /// Command and arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    fn into_options(self) -> RunOptions {
        RunOptions {
            interactive: self.interactive || self.tty,
            resources: ResourceConfig {
                memory_limit: self.mem,
                cpu_cfs_quota: self.cpu,
                cpu_share: self.cpushare,
                cpu_set: self.cpuset,
            },
            image: self.image,
            command: self.command,
            name: self.name,
            volume: self.volume,
        }
    }
}

/// Executes the `run` command.
///
/// Prints the container name for detached runs; interactive runs exit with
/// the container's exit code.
///
/// # Errors
///
/// Returns an error if the container cannot be created or started.
pub fn execute(args: RunArgs, engine: &Engine) -> anyhow::Result<()> {
    let opts = args.into_options();
    match engine.run(&opts).map_err(|e| anyhow::anyhow!("{e}"))? {
        RunOutcome::Detached { name, .. } => {
            println!("{name}");
            Ok(())
        }
        RunOutcome::Exited { code, .. } => std::process::exit(code),
    }
}
