//! System-wide constants and default paths.

/// Default directory holding one subdirectory per container record.
pub const DEFAULT_REGISTRY_ROOT: &str = "/var/run/minidock";

/// Default directory holding per-container overlay workspaces.
pub const DEFAULT_WORKSPACE_ROOT: &str = "/var/lib/minidock/containers";

/// Default directory holding image archives (`<image>.tar`).
pub const DEFAULT_IMAGE_ROOT: &str = "/var/lib/minidock/images";

/// Default cgroup directory created under each subsystem hierarchy.
pub const DEFAULT_CGROUP_PARENT: &str = "minidock";

/// Name of the per-container record file.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Name of the per-container stdout log for detached containers.
pub const LOG_FILE_NAME: &str = "container.log";

/// Extension of image archives under the image root.
pub const IMAGE_EXTENSION: &str = "tar";

/// Number of decimal digits in a generated container ID.
pub const ID_LENGTH: usize = 10;

/// Sentinel first argument that makes the binary run as container init.
pub const INIT_COMMAND: &str = "init";

/// File descriptor the init process reads its command from.
pub const COMMAND_FD: i32 = 3;

/// Hostname set inside every container's UTS namespace.
pub const CONTAINER_HOSTNAME: &str = "container";
