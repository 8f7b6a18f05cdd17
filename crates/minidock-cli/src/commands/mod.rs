//! CLI command definitions and dispatch.

pub mod commit;
pub mod exec;
pub mod init;
pub mod logs;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use minidock_common::config::RuntimeContext;
use minidock_common::constants;
use minidock_runtime::Engine;

/// minidock: a minimal container runtime.
#[derive(Parser, Debug)]
#[command(name = "minidock", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Where container state lives.
    #[command(flatten)]
    pub paths: PathArgs,
}

/// On-disk locations, overridable per invocation or through the environment.
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Directory of container records and logs.
    #[arg(
        long,
        global = true,
        env = "MINIDOCK_REGISTRY_ROOT",
        default_value = constants::DEFAULT_REGISTRY_ROOT
    )]
    pub registry_root: PathBuf,

    /// Directory of per-container overlay workspaces.
    #[arg(
        long,
        global = true,
        env = "MINIDOCK_WORKSPACE_ROOT",
        default_value = constants::DEFAULT_WORKSPACE_ROOT
    )]
    pub workspace_root: PathBuf,

    /// Directory of image archives.
    #[arg(
        long,
        global = true,
        env = "MINIDOCK_IMAGE_ROOT",
        default_value = constants::DEFAULT_IMAGE_ROOT
    )]
    pub image_root: PathBuf,
}

impl PathArgs {
    /// Builds the runtime context these paths describe.
    #[must_use]
    pub fn context(&self) -> RuntimeContext {
        RuntimeContext {
            registry_root: self.registry_root.clone(),
            workspace_root: self.workspace_root.clone(),
            image_root: self.image_root.clone(),
            ..RuntimeContext::default()
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a container.
    Run(run::RunArgs),
    /// Container init process. Internal, never call it directly.
    #[command(hide = true)]
    Init,
    /// Execute a command inside a running container.
    Exec(exec::ExecArgs),
    /// List containers.
    Ps,
    /// Print the output of a detached container.
    Logs(logs::LogsArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a stopped container.
    Rm(rm::RmArgs),
    /// Save a container's filesystem as a new image.
    Commit(commit::CommitArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let engine = Engine::new(cli.paths.context());
    match cli.command {
        Command::Run(args) => run::execute(args, &engine),
        Command::Init => init::execute(),
        Command::Exec(args) => exec::execute(args, &engine),
        Command::Ps => ps::execute(&engine),
        Command::Logs(args) => logs::execute(args, &engine),
        Command::Stop(args) => stop::execute(args, &engine),
        Command::Rm(args) => rm::execute(args, &engine),
        Command::Commit(args) => commit::execute(args, &engine),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_paths_default_to_system_locations() {
        let cli = Cli::try_parse_from(["minidock", "ps"]).unwrap();
        let ctx = cli.paths.context();
        assert_eq!(ctx, RuntimeContext::default());
    }

    #[test]
    fn global_paths_can_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["minidock", "ps", "--registry-root", "/tmp/reg"]).unwrap();
        assert_eq!(cli.paths.registry_root, PathBuf::from("/tmp/reg"));
    }

    #[test]
    fn init_is_hidden_but_parses() {
        let cli = Cli::try_parse_from(["minidock", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
        let help = Cli::command().render_help().to_string();
        assert!(!help.contains("init"));
    }
}
