//! CPU pinning via the cgroup v1 `cpuset` subsystem.

use minidock_common::types::ResourceConfig;

use super::ControlWrite;

/// Control files to write for the requested CPU list.
#[must_use]
pub fn limit_files(cfg: &ResourceConfig) -> Vec<ControlWrite> {
    if cfg.cpu_set.is_empty() {
        return Vec::new();
    }
    vec![ControlWrite::new("cpuset.cpus", cfg.cpu_set.clone())]
}
