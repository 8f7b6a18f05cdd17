//! Unpacking image archives into container layers.
//!
//! Archives carry no metadata beyond the tar stream itself, so every
//! container gets a fresh extraction of its image.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use minidock_common::error::{MinidockError, Result};

/// Leading bytes of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Summary of an unpacked archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedLayer {
    /// Size of the archive file in bytes.
    pub archive_bytes: u64,
    /// Whether the archive was gzip-compressed.
    pub compressed: bool,
}

/// Extracts the tar archive at `archive_path` into `target`.
///
/// Plain and gzip-compressed archives are both accepted; compression is
/// detected from the first bytes of the file, not its extension, because
/// committed images are gzip streams stored under a `.tar` name. Existing
/// files in `target` are overwritten and permissions are preserved.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or unpacked.
pub fn extract_layer(archive_path: &Path, target: &Path) -> Result<ExtractedLayer> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting layer"
    );

    std::fs::create_dir_all(target).map_err(|e| MinidockError::io(target, e))?;

    let file = File::open(archive_path).map_err(|e| MinidockError::io(archive_path, e))?;
    let archive_bytes = file
        .metadata()
        .map_err(|e| MinidockError::io(archive_path, e))?
        .len();

    let mut reader = BufReader::new(file);
    let compressed = starts_with_gzip_magic(&mut reader)
        .map_err(|e| MinidockError::io(archive_path, e))?;

    if compressed {
        unpack(flate2::read::GzDecoder::new(reader), target)?;
    } else {
        unpack(reader, target)?;
    }

    tracing::info!(size = archive_bytes, compressed, "layer extracted");
    Ok(ExtractedLayer {
        archive_bytes,
        compressed,
    })
}

fn unpack(reader: impl Read, target: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(target).map_err(|e| MinidockError::io(target, e))
}

/// Peeks at the buffered head of `reader` without consuming it.
fn starts_with_gzip_magic(reader: &mut impl BufRead) -> std::io::Result<bool> {
    let head = reader.fill_buf()?;
    Ok(head.starts_with(&GZIP_MAGIC))
}
