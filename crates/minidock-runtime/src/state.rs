//! Persistent container records.
//!
//! Every container owns `{registry_root}/{name}/config.json`, rewritten in
//! full on each change. There is no daemon and no locking: concurrent
//! invocations against the same container race.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use minidock_common::constants::{CONFIG_FILE_NAME, LOG_FILE_NAME};
use minidock_common::error::{MinidockError, Result};
use minidock_common::types::{ContainerId, ContainerStatus};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

/// Format of [`ContainerInfo::created_time`].
const CREATED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Persistent record of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Host PID of the init process while running, empty once stopped.
    pub pid: String,
    /// Random identifier; also the default name.
    pub id: ContainerId,
    /// Unique name within the registry.
    pub name: String,
    /// User command, space-joined.
    pub command: String,
    /// Local creation time, `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "createTime")]
    pub created_time: String,
    /// Lifecycle status.
    pub status: ContainerStatus,
    /// Raw `host:container` volume spec, or empty.
    pub volume: String,
    /// Port mappings. Recorded but never acted upon.
    #[serde(default)]
    pub portmapping: Vec<String>,
}

impl ContainerInfo {
    /// Builds the record of a freshly launched container.
    #[must_use]
    pub fn running(
        id: ContainerId,
        name: &str,
        pid: u32,
        command: &[String],
        volume: &str,
    ) -> Self {
        Self {
            pid: pid.to_string(),
            id,
            name: name.to_string(),
            command: command.join(" "),
            created_time: chrono::Local::now().format(CREATED_TIME_FORMAT).to_string(),
            status: ContainerStatus::Running,
            volume: volume.to_string(),
            portmapping: Vec::new(),
        }
    }

    /// Parses the recorded host PID.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::Config`] if the field is empty, garbage or
    /// not a positive PID.
    pub fn host_pid(&self) -> Result<Pid> {
        match self.pid.parse::<i32>() {
            Ok(raw) if raw > 0 => Ok(Pid::from_raw(raw)),
            _ => Err(MinidockError::Config {
                message: format!("container {} has invalid pid {:?}", self.name, self.pid),
            }),
        }
    }

    /// Refuses `operation` unless the container is in `expected` state.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::StateConflict`] on mismatch.
    pub fn require(&self, expected: ContainerStatus, operation: &'static str) -> Result<()> {
        if self.status == expected {
            return Ok(());
        }
        Err(MinidockError::StateConflict {
            id: self.name.clone(),
            state: self.status.to_string(),
            operation,
        })
    }
}

/// Directory of container records.
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    /// Opens the registry at `root`. Nothing is created until a save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Registry root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the record and log of `name`.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Detached stdout log of `name`.
    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(LOG_FILE_NAME)
    }

    fn info_path(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(CONFIG_FILE_NAME)
    }

    /// Returns `true` if a record directory exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.container_dir(name).is_dir()
    }

    /// Fails if `name` is already taken.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::Config`] if a record directory exists.
    pub fn ensure_available(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(MinidockError::Config {
                message: format!("container name {name:?} is already in use"),
            });
        }
        Ok(())
    }

    /// Creates the record directory of `name` if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.container_dir(name);
        std::fs::create_dir_all(&dir).map_err(|e| MinidockError::io(&dir, e))?;
        Ok(dir)
    }

    /// Writes `info`, replacing any previous record of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, info: &ContainerInfo) -> Result<()> {
        let _ = self.create_dir(&info.name)?;
        let path = self.info_path(&info.name);
        let json = serde_json::to_vec(info)?;
        std::fs::write(&path, json).map_err(|e| MinidockError::io(&path, e))?;
        tracing::debug!(name = %info.name, status = %info.status, "record saved");
        Ok(())
    }

    /// Reads the record of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MinidockError::NotFound`] if there is no record, or an
    /// error if it cannot be read or parsed.
    pub fn load(&self, name: &str) -> Result<ContainerInfo> {
        let path = self.info_path(name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MinidockError::NotFound {
                    kind: "container",
                    id: name.to_string(),
                });
            }
            Err(e) => return Err(MinidockError::io(&path, e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Deletes the record directory of `name`, log included.
    ///
    /// A missing directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn remove(&self, name: &str) -> Result<()> {
        let dir = self.container_dir(name);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!(name, "record removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MinidockError::io(&dir, e)),
        }
    }

    /// Lists every readable record, sorted by name.
    ///
    /// Entries whose record is missing or unparsable are logged and
    /// skipped. A missing registry root yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry root exists but cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerInfo>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MinidockError::io(&self.root, e)),
        };

        let mut infos = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.load(&name) {
                Ok(info) => infos.push(info),
                Err(e) => tracing::error!(name = %name, error = %e, "skipping unreadable record"),
            }
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> ContainerInfo {
        ContainerInfo::running(
            ContainerId::new("0123456789"),
            name,
            4242,
            &["/bin/top".into(), "-b".into()],
            "/data:/mnt",
        )
    }

    #[test]
    fn json_uses_record_key_names() {
        let json = serde_json::to_value(sample("web")).unwrap();
        let keys = [
            "pid",
            "id",
            "name",
            "command",
            "createTime",
            "status",
            "volume",
            "portmapping",
        ];
        for key in keys {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["status"], "running");
        assert_eq!(json["command"], "/bin/top -b");
        assert_eq!(json["pid"], "4242");
    }

    #[test]
    fn created_time_has_expected_shape() {
        let info = sample("web");
        assert!(
            chrono::NaiveDateTime::parse_from_str(&info.created_time, CREATED_TIME_FORMAT).is_ok(),
            "{}",
            info.created_time
        );
    }

    #[test]
    fn portmapping_is_optional_on_read() {
        let json = r#"{"pid":"1","id":"1","name":"a","command":"sh","createTime":"t",
            "status":"stopped","volume":""}"#;
        let info: ContainerInfo = serde_json::from_str(json).unwrap();
        assert!(info.portmapping.is_empty());
        assert_eq!(info.status, ContainerStatus::Stopped);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        let info = sample("web");

        registry.save(&info).unwrap();
        assert_eq!(registry.load("web").unwrap(), info);
        assert!(dir.path().join("web/config.json").is_file());
    }

    #[test]
    fn load_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Registry::new(dir.path()).load("ghost").unwrap_err();
        assert!(matches!(err, MinidockError::NotFound { .. }));
    }

    #[test]
    fn list_skips_corrupt_records_and_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        registry.save(&sample("b")).unwrap();
        registry.save(&sample("a")).unwrap();
        std::fs::create_dir(dir.path().join("broken")).unwrap();
        std::fs::write(dir.path().join("broken/config.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join("stray-file"), b"").unwrap();

        let names: Vec<_> = registry.list().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn list_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Registry::new(dir.path().join("none")).list().unwrap().is_empty());
    }

    #[test]
    fn name_becomes_unavailable_once_saved() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        registry.ensure_available("web").unwrap();
        registry.save(&sample("web")).unwrap();
        assert!(matches!(
            registry.ensure_available("web"),
            Err(MinidockError::Config { .. })
        ));
    }

    #[test]
    fn require_reports_current_state() {
        let info = sample("web");
        info.require(ContainerStatus::Running, "stop").unwrap();
        let err = info.require(ContainerStatus::Stopped, "remove").unwrap_err();
        assert_eq!(err.to_string(), "cannot remove container web: it is running");
    }

    #[test]
    fn host_pid_rejects_empty_and_non_positive() {
        let mut info = sample("web");
        assert_eq!(info.host_pid().unwrap(), Pid::from_raw(4242));
        for bad in ["", "0", "-3", "abc"] {
            info.pid = bad.into();
            assert!(info.host_pid().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        registry.save(&sample("web")).unwrap();
        registry.remove("web").unwrap();
        registry.remove("web").unwrap();
        assert!(!registry.contains("web"));
    }
}
