//! # minidock-runtime
//!
//! Container lifecycle management for the minidock runtime: launching the
//! init process into new namespaces, the init process itself, the on-disk
//! registry, and the `stop`/`rm`/`ps`/`logs`/`exec`/`commit` operations.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod channel;
pub mod engine;
pub mod exec;
pub mod init;
pub mod logs;
pub mod process;
pub mod state;
pub mod tty;

pub use engine::{Engine, RunOptions, RunOutcome};
