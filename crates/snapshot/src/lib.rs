//! File-backed durability for a single [`vitals_core::Store`] dump (spec's
//! C3).
//!
//! Writes take an exclusive advisory lock on the target path for the
//! duration of the write and land via write-to-temp-then-rename so a crash
//! mid-write never leaves a half-written file behind. A missing or empty
//! file reads back as an empty snapshot rather than an error — the first
//! run against a fresh path has nothing to restore.

use std::fs::{self, File, OpenOptions};
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use vitals_core::error::{Error, Result};

/// A single JSON snapshot file at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Point at `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotFile { path: path.into() }
    }

    /// Read the snapshot's raw JSON. A missing or empty file yields an
    /// empty string, not an error.
    pub fn read(&self) -> Result<String> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
            Err(err) => return Err(Error::from(err)),
        };
        file.lock_shared().map_err(Error::from)?;
        let mut contents = String::new();
        let read_result = file.read_to_string(&mut contents);
        FileExt::unlock(&file).ok();
        read_result.map_err(Error::from)?;
        Ok(contents)
    }

    /// Atomically overwrite the snapshot with `json`: write to a sibling
    /// temp file under an exclusive lock, then rename over the target.
    pub fn write(&self, json: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp_file.lock_exclusive().map_err(Error::from)?;
        let write_result = tmp_file.write_all(json.as_bytes()).and_then(|_| tmp_file.sync_all());
        FileExt::unlock(&tmp_file).ok();
        write_result?;

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// The path this snapshot lives at.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join("missing.json"));
        assert_eq!(snapshot.read().unwrap(), "");
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join("state.json"));
        snapshot.write(r#"{"gauges":{},"counters":{}}"#).unwrap();
        assert_eq!(snapshot.read().unwrap(), r#"{"gauges":{},"counters":{}}"#);
    }

    #[test]
    fn write_overwrites_without_leaving_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let snapshot = SnapshotFile::new(&path);
        snapshot.write("first").unwrap();
        snapshot.write("second").unwrap();
        assert_eq!(snapshot.read().unwrap(), "second");
        assert!(!snapshot.tmp_path().exists());
    }

    #[test]
    fn empty_file_reads_as_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        File::create(&path).unwrap();
        let snapshot = SnapshotFile::new(&path);
        assert_eq!(snapshot.read().unwrap(), "");
    }
}
