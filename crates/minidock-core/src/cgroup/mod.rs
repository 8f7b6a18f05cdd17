//! Cgroup v1 resource management.
//!
//! A [`CgroupManager`] owns one container's cgroup directory under each of
//! the `cpu`, `cpuset` and `memory` hierarchies. Every operation fans out
//! over [`Subsystem::ALL`] and keeps going when one subsystem fails: a
//! container still starts with partial limits when a hierarchy is missing
//! or read-only. Failures are logged and handed back to the caller.

pub mod cpu;
pub mod cpuset;
pub mod memory;
pub mod mountinfo;

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use minidock_common::error::{MinidockError, Result};
use minidock_common::types::ResourceConfig;

use self::mountinfo::MountTable;

/// Name of the per-cgroup membership file in cgroup v1.
const TASKS_FILE: &str = "tasks";

/// Cpuset files a child cgroup must copy from its parent before use.
const CPUSET_INHERITED: [&str; 2] = ["cpuset.cpus", "cpuset.mems"];

/// A single `file = value` write into a cgroup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlWrite {
    /// Control file name, relative to the cgroup directory.
    pub file: &'static str,
    /// Raw value written to the file.
    pub value: String,
}

impl ControlWrite {
    /// Creates a control write.
    pub fn new(file: &'static str, value: impl Into<String>) -> Self {
        Self {
            file,
            value: value.into(),
        }
    }
}

/// The cgroup v1 subsystems minidock manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// CFS bandwidth and shares.
    Cpu,
    /// CPU pinning.
    Cpuset,
    /// Hard memory limit.
    Memory,
}

impl Subsystem {
    /// Every managed subsystem, in the order operations visit them.
    pub const ALL: [Self; 3] = [Self::Cpu, Self::Cpuset, Self::Memory];

    /// Name of the subsystem as it appears in mount options.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cpuset => "cpuset",
            Self::Memory => "memory",
        }
    }

    /// Control files this subsystem writes for `cfg`.
    #[must_use]
    pub fn limit_files(self, cfg: &ResourceConfig) -> Vec<ControlWrite> {
        match self {
            Self::Cpu => cpu::limit_files(cfg),
            Self::Cpuset => cpuset::limit_files(cfg),
            Self::Memory => memory::limit_files(cfg),
        }
    }

    /// Whether `cfg` requests any limit handled by this subsystem.
    #[must_use]
    pub fn is_active(self, cfg: &ResourceConfig) -> bool {
        !self.limit_files(cfg).is_empty()
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A per-subsystem failure collected during a fan-out operation.
#[derive(Debug)]
pub struct SubsystemFailure {
    /// Subsystem that failed.
    pub subsystem: Subsystem,
    /// What went wrong.
    pub error: MinidockError,
}

/// Handle to one container's cgroups across all managed subsystems.
#[derive(Debug)]
pub struct CgroupManager {
    /// Cgroup path relative to each hierarchy root.
    relative: PathBuf,
    /// Resolved hierarchy mount point per subsystem; `None` means inert.
    hierarchies: Vec<(Subsystem, Option<PathBuf>)>,
}

impl CgroupManager {
    /// Creates a manager for `relative`, resolving hierarchies from `mounts`.
    ///
    /// Subsystems without a mounted hierarchy stay inert for the lifetime
    /// of the manager; no error is raised here.
    pub fn new(relative: impl Into<PathBuf>, mounts: &MountTable) -> Self {
        let relative = relative.into();
        let hierarchies = Subsystem::ALL
            .iter()
            .map(|&s| (s, mounts.find_subsystem(s.name()).map(Path::to_path_buf)))
            .collect();
        Self {
            relative,
            hierarchies,
        }
    }

    /// Creates a manager using the current process's mount table.
    ///
    /// An unreadable mount table leaves every subsystem inert.
    pub fn discover(relative: impl Into<PathBuf>) -> Self {
        let mounts = MountTable::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cannot read mount table, cgroup limits disabled");
            MountTable::default()
        });
        Self::new(relative, &mounts)
    }

    /// Absolute cgroup directory of this container for `subsystem`.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::NotFound`] if no hierarchy carries `subsystem`.
    pub fn subsystem_path(&self, subsystem: Subsystem) -> Result<PathBuf> {
        self.mount_point(subsystem)
            .map(|root| root.join(&self.relative))
            .ok_or_else(|| MinidockError::NotFound {
                kind: "cgroup hierarchy",
                id: subsystem.name().to_string(),
            })
    }

    /// Creates the cgroup directories and writes the requested limits.
    ///
    /// Only subsystems with an active limit are touched.
    pub fn set(&self, cfg: &ResourceConfig) -> Vec<SubsystemFailure> {
        self.fan_out("set", |subsystem| self.set_one(subsystem, cfg))
    }

    /// Moves `pid` into every subsystem that has an active limit.
    ///
    /// Must run after [`CgroupManager::set`].
    pub fn apply(&self, pid: u32, cfg: &ResourceConfig) -> Vec<SubsystemFailure> {
        self.fan_out("apply", |subsystem| self.apply_one(subsystem, pid, cfg))
    }

    /// Removes this container's cgroup directory from every hierarchy.
    pub fn destroy(&self) -> Vec<SubsystemFailure> {
        self.fan_out("destroy", |subsystem| self.destroy_one(subsystem))
    }

    fn fan_out(
        &self,
        operation: &'static str,
        mut step: impl FnMut(Subsystem) -> Result<()>,
    ) -> Vec<SubsystemFailure> {
        let mut failures = Vec::new();
        for subsystem in Subsystem::ALL {
            if let Err(error) = step(subsystem) {
                tracing::error!(
                    subsystem = subsystem.name(),
                    cgroup = %self.relative.display(),
                    operation,
                    error = %error,
                    "cgroup subsystem operation failed"
                );
                failures.push(SubsystemFailure { subsystem, error });
            }
        }
        failures
    }

    fn mount_point(&self, subsystem: Subsystem) -> Option<&Path> {
        self.hierarchies
            .iter()
            .find(|(s, _)| *s == subsystem)
            .and_then(|(_, root)| root.as_deref())
    }

    /// Cgroup directory for an active subsystem, or `None` when inert.
    fn active_dir(&self, subsystem: Subsystem) -> Option<PathBuf> {
        let dir = self.mount_point(subsystem).map(|root| root.join(&self.relative));
        if dir.is_none() {
            tracing::warn!(
                subsystem = subsystem.name(),
                "no hierarchy mounted for subsystem, limit ignored"
            );
        }
        dir
    }

    fn set_one(&self, subsystem: Subsystem, cfg: &ResourceConfig) -> Result<()> {
        let writes = subsystem.limit_files(cfg);
        if writes.is_empty() {
            return Ok(());
        }
        let Some(dir) = self.active_dir(subsystem) else {
            return Ok(());
        };
        std::fs::create_dir_all(&dir).map_err(|e| MinidockError::io(&dir, e))?;
        if let (Subsystem::Cpuset, Some(root)) = (subsystem, self.mount_point(subsystem)) {
            inherit_cpuset(root, &dir)?;
        }
        for write in &writes {
            write_control(&dir, write)?;
        }
        tracing::info!(subsystem = subsystem.name(), path = %dir.display(), "cgroup limits set");
        Ok(())
    }

    fn apply_one(&self, subsystem: Subsystem, pid: u32, cfg: &ResourceConfig) -> Result<()> {
        if !subsystem.is_active(cfg) {
            return Ok(());
        }
        let Some(dir) = self.active_dir(subsystem) else {
            return Ok(());
        };
        write_control(&dir, &ControlWrite::new(TASKS_FILE, pid.to_string()))?;
        tracing::debug!(subsystem = subsystem.name(), pid, "added process to cgroup");
        Ok(())
    }

    fn destroy_one(&self, subsystem: Subsystem) -> Result<()> {
        let Some(root) = self.mount_point(subsystem) else {
            return Ok(());
        };
        let dir = root.join(&self.relative);
        // cgroupfs only accepts rmdir; its control files cannot be unlinked.
        match std::fs::remove_dir(&dir) {
            Ok(()) => {
                tracing::info!(
                    subsystem = subsystem.name(),
                    path = %dir.display(),
                    "cgroup destroyed"
                );
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MinidockError::io(&dir, e)),
        }
    }
}

/// Fills empty `cpuset.cpus`/`cpuset.mems` from the parent, top down.
///
/// A new cpuset cgroup starts with both empty and refuses tasks until they
/// are set; this applies to the intermediate parent directory as well.
fn inherit_cpuset(root: &Path, dir: &Path) -> Result<()> {
    let Ok(relative) = dir.strip_prefix(root) else {
        return Ok(());
    };
    let mut parent = root.to_path_buf();
    for component in relative.components() {
        let child = parent.join(component);
        for file in CPUSET_INHERITED {
            let target = child.join(file);
            let is_empty = std::fs::read_to_string(&target).is_ok_and(|v| v.trim().is_empty());
            if is_empty {
                let source = parent.join(file);
                let value =
                    std::fs::read_to_string(&source).map_err(|e| MinidockError::io(&source, e))?;
                std::fs::write(&target, value.trim()).map_err(|e| MinidockError::io(&target, e))?;
            }
        }
        parent = child;
    }
    Ok(())
}

fn write_control(dir: &Path, write: &ControlWrite) -> Result<()> {
    let file = dir.join(write.file);
    std::fs::write(&file, &write.value).map_err(|e| MinidockError::io(&file, e))?;
    tracing::debug!(file = %file.display(), value = %write.value, "cgroup control written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fake mount table whose hierarchies live under `root`.
    fn fake_mounts(root: &Path, subsystems: &[&str]) -> MountTable {
        let content: String = subsystems
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let dir = root.join(name);
                std::fs::create_dir_all(&dir).expect("mkdir hierarchy");
                format!(
                    "{} 38 0:{} / {} rw,nosuid - cgroup cgroup rw,{}\n",
                    40 + i,
                    40 + i,
                    dir.display(),
                    name
                )
            })
            .collect();
        MountTable::parse(&content)
    }

    fn all_limits() -> ResourceConfig {
        ResourceConfig {
            memory_limit: "100m".into(),
            cpu_cfs_quota: 20,
            cpu_share: "512".into(),
            cpu_set: "0".into(),
        }
    }

    #[test]
    fn empty_config_touches_no_cgroup_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mounts = fake_mounts(dir.path(), &["cpu", "cpuset", "memory"]);
        let manager = CgroupManager::new("minidock/web", &mounts);

        let cfg = ResourceConfig::default();
        assert!(manager.set(&cfg).is_empty());
        assert!(manager.apply(4242, &cfg).is_empty());

        for name in ["cpu", "cpuset", "memory"] {
            assert!(!dir.path().join(name).join("minidock").exists());
        }
    }

    #[test]
    fn cpu_quota_twenty_percent_writes_twenty_thousand() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mounts = fake_mounts(dir.path(), &["cpu", "cpuset", "memory"]);
        let manager = CgroupManager::new("minidock/web", &mounts);
        let cfg = ResourceConfig {
            cpu_cfs_quota: 20,
            ..ResourceConfig::default()
        };

        assert!(manager.set(&cfg).is_empty());

        let cgroup = dir.path().join("cpu/minidock/web");
        let quota = std::fs::read_to_string(cgroup.join("cpu.cfs_quota_us")).expect("quota");
        let period = std::fs::read_to_string(cgroup.join("cpu.cfs_period_us")).expect("period");
        assert_eq!(quota, "20000");
        assert_eq!(period, "100000");
        assert!(!dir.path().join("memory/minidock").exists());
    }

    #[test]
    fn set_and_apply_write_limits_and_tasks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mounts = fake_mounts(dir.path(), &["cpu", "cpuset", "memory"]);
        let manager = CgroupManager::new("minidock/web", &mounts);
        let cfg = all_limits();

        assert!(manager.set(&cfg).is_empty());
        assert!(manager.apply(4242, &cfg).is_empty());

        let read = |p: &str| std::fs::read_to_string(dir.path().join(p)).expect(p);
        assert_eq!(read("memory/minidock/web/memory.limit_in_bytes"), "100m");
        assert_eq!(read("cpuset/minidock/web/cpuset.cpus"), "0");
        assert_eq!(read("cpu/minidock/web/cpu.shares"), "512");
        for name in ["cpu", "cpuset", "memory"] {
            assert_eq!(read(&format!("{name}/minidock/web/tasks")), "4242");
        }
    }

    #[test]
    fn apply_skips_subsystems_without_limits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mounts = fake_mounts(dir.path(), &["cpu", "cpuset", "memory"]);
        let manager = CgroupManager::new("minidock/web", &mounts);
        let cfg = ResourceConfig {
            memory_limit: "64m".into(),
            ..ResourceConfig::default()
        };

        assert!(manager.set(&cfg).is_empty());
        assert!(manager.apply(7, &cfg).is_empty());

        assert!(dir.path().join("memory/minidock/web/tasks").exists());
        assert!(!dir.path().join("cpu/minidock/web").exists());
    }

    #[test]
    fn missing_hierarchy_is_inert_but_path_lookup_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mounts = fake_mounts(dir.path(), &["memory"]);
        let manager = CgroupManager::new("minidock/web", &mounts);
        let cfg = all_limits();

        assert!(manager.set(&cfg).is_empty());
        assert!(manager.apply(99, &cfg).is_empty());
        assert!(dir.path().join("memory/minidock/web/tasks").exists());

        let err = manager.subsystem_path(Subsystem::Cpu).unwrap_err();
        assert!(matches!(err, MinidockError::NotFound { .. }));
        assert_eq!(
            manager.subsystem_path(Subsystem::Memory).unwrap(),
            dir.path().join("memory/minidock/web")
        );
    }

    #[test]
    fn one_failing_subsystem_does_not_stop_the_others() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mounts = fake_mounts(dir.path(), &["cpu", "cpuset", "memory"]);
        // A regular file where the cpu cgroup directory should go.
        std::fs::create_dir_all(dir.path().join("cpu/minidock")).expect("mkdir");
        std::fs::write(dir.path().join("cpu/minidock/web"), b"").expect("blocker");
        let manager = CgroupManager::new("minidock/web", &mounts);

        let failures = manager.set(&all_limits());

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subsystem, Subsystem::Cpu);
        assert!(dir.path().join("cpuset/minidock/web/cpuset.cpus").exists());
        assert!(dir.path().join("memory/minidock/web/memory.limit_in_bytes").exists());
    }

    #[test]
    fn destroy_removes_directories_and_is_repeatable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mounts = fake_mounts(dir.path(), &["cpu", "cpuset", "memory"]);
        // rmdir on cgroupfs ignores control files, so an empty directory
        // stands in for a populated cgroup here.
        for name in ["cpu", "cpuset", "memory"] {
            std::fs::create_dir_all(dir.path().join(name).join("minidock/web")).expect("mkdir");
        }
        let manager = CgroupManager::new("minidock/web", &mounts);

        assert!(manager.destroy().is_empty());
        assert!(manager.destroy().is_empty());

        for name in ["cpu", "cpuset", "memory"] {
            assert!(!dir.path().join(name).join("minidock/web").exists());
        }
    }

    #[test]
    fn destroy_reports_a_busy_cgroup_and_keeps_going() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mounts = fake_mounts(dir.path(), &["cpu", "cpuset", "memory"]);
        for name in ["cpu", "cpuset"] {
            std::fs::create_dir_all(dir.path().join(name).join("minidock/web")).expect("mkdir");
        }
        // A child cgroup makes rmdir fail on cgroupfs as well.
        std::fs::create_dir_all(dir.path().join("memory/minidock/web/child")).expect("mkdir");
        let manager = CgroupManager::new("minidock/web", &mounts);

        let failures = manager.destroy();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subsystem, Subsystem::Memory);
        assert!(dir.path().join("memory/minidock/web/child").exists());
        assert!(!dir.path().join("cpu/minidock/web").exists());
        assert!(!dir.path().join("cpuset/minidock/web").exists());
    }

    #[test]
    fn cpuset_values_are_inherited_down_the_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mounts = fake_mounts(dir.path(), &["cpuset"]);
        let root = dir.path().join("cpuset");
        std::fs::write(root.join("cpuset.cpus"), "0-3\n").expect("root cpus");
        std::fs::write(root.join("cpuset.mems"), "0\n").expect("root mems");
        // cgroupfs creates these files, empty, along with each directory.
        for sub in ["minidock", "minidock/web"] {
            std::fs::create_dir_all(root.join(sub)).expect("mkdir");
            for file in CPUSET_INHERITED {
                std::fs::write(root.join(sub).join(file), "").expect("empty file");
            }
        }
        let manager = CgroupManager::new("minidock/web", &mounts);
        let cfg = ResourceConfig {
            cpu_set: "1".into(),
            ..ResourceConfig::default()
        };

        assert!(manager.set(&cfg).is_empty());

        let read = |p: &str| std::fs::read_to_string(root.join(p)).expect(p);
        assert_eq!(read("minidock/cpuset.cpus"), "0-3");
        assert_eq!(read("minidock/cpuset.mems"), "0");
        assert_eq!(read("minidock/web/cpuset.mems"), "0");
        assert_eq!(read("minidock/web/cpuset.cpus"), "1");
    }

    #[test]
    fn subsystem_names_match_mount_options() {
        let names: Vec<_> = Subsystem::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["cpu", "cpuset", "memory"]);
    }
}
