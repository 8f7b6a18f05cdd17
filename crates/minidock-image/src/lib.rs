//! # minidock-image
//!
//! Image archive handling for the minidock runtime.
//!
//! An image is a single tar archive (optionally gzip-compressed) stored as
//! `{image_root}/{image}.tar`. Handles:
//! - **Layers**: unpacking an image into a container's `lower` directory.
//! - **Snapshots**: archiving a container's `merged` tree as a new image.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod layer;
pub mod snapshot;
