//! CPU bandwidth and weight control via the cgroup v1 `cpu` subsystem.
//!
//! Manages `cpu.shares`, `cpu.cfs_period_us`, and `cpu.cfs_quota_us`.

use minidock_common::types::ResourceConfig;

use super::ControlWrite;

/// CFS scheduling period written alongside every quota, in microseconds.
pub const CFS_PERIOD_US: u64 = 100_000;

/// Converts a percentage of one CPU into a CFS quota for [`CFS_PERIOD_US`].
///
/// `cfs_quota_us(20)` is `20000`: the group may run 20ms in every 100ms.
#[must_use]
pub fn cfs_quota_us(percent: u32) -> u64 {
    CFS_PERIOD_US / 100 * u64::from(percent)
}

/// Control files to write for the requested CPU limits.
///
/// The share is passed through verbatim; the quota is only written
/// together with its period.
#[must_use]
pub fn limit_files(cfg: &ResourceConfig) -> Vec<ControlWrite> {
    let mut writes = Vec::new();
    if !cfg.cpu_share.is_empty() {
        writes.push(ControlWrite::new("cpu.shares", cfg.cpu_share.clone()));
    }
    if cfg.cpu_cfs_quota != 0 {
        writes.push(ControlWrite::new(
            "cpu.cfs_period_us",
            CFS_PERIOD_US.to_string(),
        ));
        writes.push(ControlWrite::new(
            "cpu.cfs_quota_us",
            cfs_quota_us(cfg.cpu_cfs_quota).to_string(),
        ));
    }
    writes
}
