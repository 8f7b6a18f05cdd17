//! Linux namespace management for container isolation.
//!
//! [`NamespaceConfig`] selects the namespaces a new container gets at
//! `clone(2)` time; [`join`] reopens the namespaces of a running container
//! so `exec` can enter them with `setns(2)`.

pub mod join;

use nix::sched::CloneFlags;

/// A namespace kind minidock isolates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// System V IPC and POSIX message queues.
    Ipc,
    /// Hostname and domain name.
    Uts,
    /// Network devices, addresses and routes.
    Net,
    /// Process IDs; the container init is PID 1.
    Pid,
    /// Mount table.
    Mnt,
}

impl Namespace {
    /// Order in which `exec` opens and joins namespaces.
    ///
    /// `mnt` comes last: after joining it, `/proc/{pid}/ns` of the host is
    /// no longer reachable.
    pub const JOIN_ORDER: [Self; 5] = [Self::Ipc, Self::Uts, Self::Net, Self::Pid, Self::Mnt];

    /// Entry name under `/proc/{pid}/ns/`.
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Ipc => "ipc",
            Self::Uts => "uts",
            Self::Net => "net",
            Self::Pid => "pid",
            Self::Mnt => "mnt",
        }
    }

    /// Matching `clone(2)` / `setns(2)` flag.
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
            Self::Net => CloneFlags::CLONE_NEWNET,
            Self::Pid => CloneFlags::CLONE_NEWPID,
            Self::Mnt => CloneFlags::CLONE_NEWNS,
        }
    }
}

/// Which namespaces a new container is created in.
///
/// There is deliberately no user namespace: UID/GID remapping is not
/// supported and the container runs as the invoking (root) user.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate mount namespace.
    pub mount: bool,
    /// Isolate network namespace.
    pub network: bool,
    /// Isolate IPC namespace.
    pub ipc: bool,
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            pid: true,
            mount: true,
            network: true,
            ipc: true,
            uts: true,
        }
    }
}

impl NamespaceConfig {
    /// Flags to pass to `clone(2)` for this configuration.
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        let selected = [
            (self.uts, Namespace::Uts),
            (self.pid, Namespace::Pid),
            (self.mount, Namespace::Mnt),
            (self.network, Namespace::Net),
            (self.ipc, Namespace::Ipc),
        ];
        selected
            .into_iter()
            .filter(|(on, _)| *on)
            .fold(CloneFlags::empty(), |acc, (_, ns)| acc | ns.clone_flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_isolates_five_namespaces_without_user() {
        let flags = NamespaceConfig::default().clone_flags();
        assert_eq!(
            flags,
            CloneFlags::CLONE_NEWUTS
                | CloneFlags::CLONE_NEWPID
                | CloneFlags::CLONE_NEWNS
                | CloneFlags::CLONE_NEWNET
                | CloneFlags::CLONE_NEWIPC
        );
        assert!(!flags.contains(CloneFlags::CLONE_NEWUSER));
    }

    #[test]
    fn disabled_namespaces_are_left_out() {
        let cfg = NamespaceConfig {
            network: false,
            ..NamespaceConfig::default()
        };
        assert!(!cfg.clone_flags().contains(CloneFlags::CLONE_NEWNET));
        assert!(cfg.clone_flags().contains(CloneFlags::CLONE_NEWPID));
    }

    #[test]
    fn mount_namespace_is_joined_last() {
        assert_eq!(Namespace::JOIN_ORDER.last(), Some(&Namespace::Mnt));
        let names: Vec<_> = Namespace::JOIN_ORDER.iter().map(|n| n.proc_name()).collect();
        assert_eq!(names, ["ipc", "uts", "net", "pid", "mnt"]);
    }
}
