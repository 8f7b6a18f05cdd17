//! Runtime engine that orchestrates container lifecycle.
//!
//! The engine composes the pieces: image extraction and the overlay
//! workspace, the command channel and launcher, cgroup limits, and the
//! registry record. All on-disk locations come from the [`RuntimeContext`]
//! it was built with.

use std::path::PathBuf;

use minidock_common::config::RuntimeContext;
use minidock_common::error::{MinidockError, Result};
use minidock_common::types::{ContainerId, ContainerStatus, ResourceConfig, validate_name};
use minidock_core::cgroup::CgroupManager;
use minidock_core::filesystem::overlayfs::OverlayWorkspace;
use minidock_core::namespace::NamespaceConfig;
use minidock_image::{layer, snapshot};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::channel::{self, CommandWriter};
use crate::process::{self, ContainerIo, LaunchRequest};
use crate::state::{ContainerInfo, Registry};
use crate::tty::{Pty, PtyForwarder};
use crate::{exec, logs};

/// Parameters of `run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Image name, resolved to `{image_root}/{image}.tar`.
    pub image: String,
    /// User command and arguments.
    pub command: Vec<String>,
    /// Container name; defaults to the generated ID.
    pub name: Option<String>,
    /// Attach a pseudo-terminal and wait for the container to exit.
    pub interactive: bool,
    /// Resource limits.
    pub resources: ResourceConfig,
    /// Raw `host:container` volume spec, or empty.
    pub volume: String,
}

/// What `run` left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The container keeps running in the background.
    Detached {
        /// Container name.
        name: String,
        /// Host PID of the container init.
        pid: u32,
    },
    /// An interactive container ran to completion and was cleaned up.
    Exited {
        /// Container name.
        name: String,
        /// Exit code of the container init.
        code: i32,
    },
}

/// The runtime engine that coordinates all container operations.
#[derive(Debug, Clone)]
pub struct Engine {
    ctx: RuntimeContext,
    registry: Registry,
}

impl Engine {
    /// Creates an engine operating on the locations in `ctx`.
    #[must_use]
    pub fn new(ctx: RuntimeContext) -> Self {
        let registry = Registry::new(ctx.registry_root.clone());
        Self { ctx, registry }
    }

    /// Locations this engine operates on.
    #[must_use]
    pub const fn context(&self) -> &RuntimeContext {
        &self.ctx
    }

    /// The container registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Creates and starts a container.
    ///
    /// Detached containers return as soon as the command has been handed to
    /// init. Interactive containers are waited for; once they exit, their
    /// record, workspace and cgroups are removed. Any failure before the
    /// command is handed over rolls back everything created so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty, the container or image name
    /// is not a plain file name, the name is taken, the image cannot be
    /// extracted, the workspace cannot be mounted, or the
    /// process cannot be launched or recorded.
    pub fn run(&self, opts: &RunOptions) -> Result<RunOutcome> {
        if opts.command.is_empty() {
            return Err(MinidockError::Config {
                message: "missing container command".into(),
            });
        }
        validate_name("image", &opts.image)?;
        let id = ContainerId::generate();
        let name = opts.name.clone().unwrap_or_else(|| id.to_string());
        validate_name("container", &name)?;
        self.registry.ensure_available(&name)?;

        let workspace = OverlayWorkspace::new(self.ctx.workspace_dir(&name));
        let cgroup = CgroupManager::discover(self.ctx.cgroup_path(&name));

        let started = self
            .prepare_workspace(&workspace, opts)
            .and_then(|()| self.start(id, &name, &workspace, &cgroup, opts));
        match started {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(name = %name, error = %e, "run failed, rolling back");
                self.discard(&name, &workspace, &cgroup, &opts.volume);
                Err(e)
            }
        }
    }

    fn prepare_workspace(&self, workspace: &OverlayWorkspace, opts: &RunOptions) -> Result<()> {
        workspace.create_layers()?;
        let archive = self.ctx.image_archive(&opts.image);
        let layer = layer::extract_layer(&archive, &workspace.lower())?;
        tracing::debug!(
            image = %opts.image,
            bytes = layer.archive_bytes,
            compressed = layer.compressed,
            "image extracted"
        );
        workspace.mount()?;
        workspace.mount_volume(&opts.volume)
    }

    fn start(
        &self,
        id: ContainerId,
        name: &str,
        workspace: &OverlayWorkspace,
        cgroup: &CgroupManager,
        opts: &RunOptions,
    ) -> Result<RunOutcome> {
        let (reader, writer) = channel::channel()?;
        let io = if opts.interactive {
            ContainerIo::Interactive(Pty::open()?)
        } else {
            ContainerIo::Detached(logs::create_log(&self.registry, name)?)
        };

        let rootfs = workspace.merged();
        let request = LaunchRequest {
            rootfs: &rootfs,
            namespaces: NamespaceConfig::default(),
            io: &io,
        };
        let pid = process::launch(&request, reader)?;
        let host_pid = pid.as_raw().unsigned_abs();

        if let Err(e) = self.hand_over(id, name, host_pid, cgroup, writer, opts) {
            abort_child(pid);
            return Err(e);
        }

        match io {
            ContainerIo::Detached(_) => {
                tracing::info!(name, pid = host_pid, "container running detached");
                Ok(RunOutcome::Detached {
                    name: name.to_string(),
                    pid: host_pid,
                })
            }
            ContainerIo::Interactive(pty) => {
                let forwarder = match PtyForwarder::start(pty.into_master()) {
                    Ok(forwarder) => forwarder,
                    Err(e) => {
                        abort_child(pid);
                        return Err(e);
                    }
                };
                let code = process::wait(pid);
                forwarder.finish();
                tracing::info!(name, code = ?code, "interactive container exited");
                self.discard(name, workspace, cgroup, &opts.volume);
                Ok(RunOutcome::Exited {
                    name: name.to_string(),
                    code: code?,
                })
            }
        }
    }

    /// Records the container, applies its limits and releases init.
    fn hand_over(
        &self,
        id: ContainerId,
        name: &str,
        pid: u32,
        cgroup: &CgroupManager,
        writer: CommandWriter,
        opts: &RunOptions,
    ) -> Result<()> {
        let info = ContainerInfo::running(id, name, pid, &opts.command, &opts.volume);
        self.registry.save(&info)?;

        // Per-subsystem failures are already logged; the container runs
        // with whatever limits could be applied.
        let _ = cgroup.set(&opts.resources);
        let _ = cgroup.apply(pid, &opts.resources);

        writer.send(&opts.command)
    }

    /// Best-effort removal of everything `run` may have created for `name`.
    fn discard(
        &self,
        name: &str,
        workspace: &OverlayWorkspace,
        cgroup: &CgroupManager,
        volume: &str,
    ) {
        workspace.teardown(volume);
        let _ = cgroup.destroy();
        if let Err(e) = self.registry.remove(name) {
            tracing::error!(name, error = %e, "cannot remove container record");
        }
    }

    /// Sends `SIGTERM` to a running container and marks it stopped.
    ///
    /// A container whose process already exited is still marked stopped,
    /// with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::Config`] for a malformed name,
    /// [`MinidockError::NotFound`] for an unknown name and
    /// [`MinidockError::StateConflict`] if it is not running; none of them
    /// touches the record.
    pub fn stop(&self, name: &str) -> Result<()> {
        validate_name("container", name)?;
        let mut info = self.registry.load(name)?;
        info.require(ContainerStatus::Running, "stop")?;
        let pid = info.host_pid()?;

        match kill(pid, Signal::SIGTERM) {
            Ok(()) => tracing::info!(name, pid = pid.as_raw(), "sent SIGTERM"),
            Err(Errno::ESRCH) => {
                tracing::warn!(name, pid = pid.as_raw(), "container process already gone");
            }
            Err(e) => {
                return Err(MinidockError::PermissionDenied {
                    message: format!("signalling pid {pid} failed: {e}"),
                });
            }
        }

        info.status = ContainerStatus::Stopped;
        info.pid = String::new();
        self.registry.save(&info)
    }

    /// Removes a stopped container: workspace, cgroups and record.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::Config`] for a malformed name,
    /// [`MinidockError::NotFound`] for an unknown name,
    /// [`MinidockError::StateConflict`] unless it is stopped, or an error if
    /// the record cannot be deleted.
    pub fn remove(&self, name: &str) -> Result<()> {
        validate_name("container", name)?;
        let info = self.registry.load(name)?;
        info.require(ContainerStatus::Stopped, "remove")?;

        OverlayWorkspace::new(self.ctx.workspace_dir(name)).teardown(&info.volume);
        let _ = CgroupManager::discover(self.ctx.cgroup_path(name)).destroy();
        self.registry.remove(name)?;
        tracing::info!(name, "container removed");
        Ok(())
    }

    /// Lists all recorded containers.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry root cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerInfo>> {
        self.registry.list()
    }

    /// Returns the log of a detached container.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::Config`] for a malformed name and
    /// [`MinidockError::NotFound`] for an unknown one.
    pub fn logs(&self, name: &str) -> Result<String> {
        validate_name("container", name)?;
        logs::read_logs(&self.registry, name)
    }

    /// Runs `command` inside a running container and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::Config`] for a malformed name,
    /// [`MinidockError::NotFound`] for an unknown name,
    /// [`MinidockError::StateConflict`] if it is not running, or an error
    /// if its namespaces cannot be joined.
    pub fn exec(&self, name: &str, command: &[String]) -> Result<i32> {
        validate_name("container", name)?;
        let info = self.registry.load(name)?;
        info.require(ContainerStatus::Running, "exec")?;
        let pid = info.host_pid()?;
        exec::exec_in_container(pid.as_raw().unsigned_abs(), command)
    }

    /// Archives the container's root filesystem as image `image`.
    ///
    /// The container keeps running; its filesystem is read as it is.
    /// Returns the archive path.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::Config`] for a malformed container or image
    /// name, [`MinidockError::NotFound`] for an unknown name or a missing
    /// workspace, or an error if the archive cannot be written.
    pub fn commit(&self, name: &str, image: &str) -> Result<PathBuf> {
        validate_name("container", name)?;
        validate_name("image", image)?;
        let _ = self.registry.load(name)?;
        let merged = OverlayWorkspace::new(self.ctx.workspace_dir(name)).merged();
        let archive = self.ctx.image_archive(image);
        snapshot::snapshot(&merged, &archive)?;
        tracing::info!(name, image, archive = %archive.display(), "container committed");
        Ok(archive)
    }
}

/// Kills a launched child that will never receive its command and reaps it.
fn abort_child(pid: Pid) {
    if let Err(e) = kill(pid, Signal::SIGKILL) {
        tracing::warn!(pid = pid.as_raw(), error = %e, "cannot kill aborted container");
        return;
    }
    let _ = process::wait(pid);
}
