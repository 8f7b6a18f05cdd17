//! Filesystem management for container isolation.
//!
//! Provides the per-container OverlayFS workspace, host volume binds,
//! `pivot_root` for switching the container root, and mount utilities.

pub mod mount;
pub mod overlayfs;
pub mod pivot_root;
pub mod volume;
