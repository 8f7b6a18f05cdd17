//! # minidock-core
//!
//! Low-level Linux isolation primitives for the minidock runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: clone flags for new containers and `setns(2)` handles
//!   for entering running ones.
//! - **Cgroups v1**: cpu, cpuset and memory limits discovered from the
//!   mount table.
//! - **Filesystem**: per-container `OverlayFS` workspaces, volume binds and
//!   `pivot_root`.
//!
//! Nothing here spawns processes; the runtime crate composes these pieces.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
