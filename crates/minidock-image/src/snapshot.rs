//! Saving a container's root filesystem as a new image archive.

use std::fs::File;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use minidock_common::error::{MinidockError, Result};

/// Archives the contents of `source` into a gzip-compressed tar at `archive`.
///
/// Entries are stored relative to `source`. Symlinks are kept as links
/// rather than followed, and ownership and modes are recorded as found;
/// nothing is normalized. The parent directory of `archive` is created if
/// needed and an existing archive is replaced.
///
/// # Errors
///
/// Returns an error if `source` cannot be walked or `archive` written.
pub fn snapshot(source: &Path, archive: &Path) -> Result<()> {
    if !source.is_dir() {
        return Err(MinidockError::NotFound {
            kind: "root filesystem",
            id: source.display().to_string(),
        });
    }
    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MinidockError::io(parent, e))?;
    }

    let file = File::create(archive).map_err(|e| MinidockError::io(archive, e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder
        .append_dir_all(".", source)
        .map_err(|e| MinidockError::io(source, e))?;

    let encoder = builder
        .into_inner()
        .map_err(|e| MinidockError::io(archive, e))?;
    let _ = encoder.finish().map_err(|e| MinidockError::io(archive, e))?;

    tracing::info!(source = %source.display(), archive = %archive.display(), "snapshot written");
    Ok(())
}
