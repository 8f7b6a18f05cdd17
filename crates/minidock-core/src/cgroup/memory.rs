//! Memory limiting via the cgroup v1 `memory` subsystem.
//!
//! Only the hard limit, `memory.limit_in_bytes`, is managed. The kernel
//! accepts suffixed values such as `100m`, so the limit is not parsed here.

use minidock_common::types::ResourceConfig;

use super::ControlWrite;

/// Control files to write for the requested memory limit.
#[must_use]
pub fn limit_files(cfg: &ResourceConfig) -> Vec<ControlWrite> {
    if cfg.memory_limit.is_empty() {
        return Vec::new();
    }
    vec![ControlWrite::new(
        "memory.limit_in_bytes",
        cfg.memory_limit.clone(),
    )]
}
