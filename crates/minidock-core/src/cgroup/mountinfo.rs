//! Discovery of cgroup v1 hierarchies from the process mount table.
//!
//! Each line of `/proc/self/mountinfo` looks like
//!
//! ```text
//! 43 38 0:38 / /sys/fs/cgroup/cpu,cpuacct rw,nosuid shared:16 - cgroup cgroup rw,cpu,cpuacct
//! ```
//!
//! The mount point is the fifth field; the filesystem type follows the `-`
//! separator and the super options (which name the attached subsystems)
//! are the third field after it.

use std::path::{Path, PathBuf};

use minidock_common::error::{MinidockError, Result};

const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";
const MOUNT_POINT_INDEX: usize = 4;

/// One parsed mount table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Where the filesystem is mounted.
    pub mount_point: PathBuf,
    /// Filesystem type (`cgroup`, `proc`, `overlay`, ...).
    pub fs_type: String,
    /// Comma-separated super options, split.
    pub super_options: Vec<String>,
}

/// Parsed snapshot of a mount table.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    /// Reads the mount table of the current process.
    ///
    /// # Errors
    ///
    /// Returns an error if `/proc/self/mountinfo` cannot be read.
    pub fn load() -> Result<Self> {
        let content = std::fs::read_to_string(MOUNTINFO_PATH)
            .map_err(|e| MinidockError::io(MOUNTINFO_PATH, e))?;
        Ok(Self::parse(&content))
    }

    /// Parses mountinfo-formatted text. Malformed lines are skipped.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let entries = content.lines().filter_map(parse_line).collect();
        Self { entries }
    }

    /// Returns all parsed entries.
    #[must_use]
    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// Returns the mount point of the cgroup v1 hierarchy carrying `subsystem`.
    #[must_use]
    pub fn find_subsystem(&self, subsystem: &str) -> Option<&Path> {
        self.entries
            .iter()
            .filter(|e| e.fs_type == "cgroup")
            .find(|e| e.super_options.iter().any(|opt| opt == subsystem))
            .map(|e| e.mount_point.as_path())
    }
}

fn parse_line(line: &str) -> Option<MountEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let mount_point = fields.get(MOUNT_POINT_INDEX)?;
    let separator = fields.iter().position(|f| *f == "-")?;
    let fs_type = fields.get(separator + 1)?;
    let super_options = fields.get(separator + 3)?;
    Some(MountEntry {
        mount_point: PathBuf::from(unescape(mount_point)),
        fs_type: (*fs_type).to_string(),
        super_options: super_options.split(',').map(str::to_string).collect(),
    })
}

/// Decodes the octal escapes (`\040` for space) the kernel uses in paths.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal(&bytes[i + 1..i + 4]) {
            let value =
                (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal(digits: &[u8]) -> bool {
    digits.len() == 3 && digits[0] <= b'3' && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
