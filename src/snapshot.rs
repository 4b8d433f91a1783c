//! # Snapshots
//!
//! Private copies of browser databases. Browsers keep their SQLite files locked
//! while running, so extraction never opens a source file directly: the file is
//! copied into the snapshot directory and the copy is opened read-only. When a
//! direct copy is denied on Windows, the file is read from the most recent
//! volume shadow copy instead.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::debug;

use crate::logging::AcquisitionLog;

const SHADOW_VOLUME_MARKER: &str = "Shadow Copy Volume:";
const SQLITE_SIDECARS: [&str; 3] = ["-wal", "-shm", "-journal"];
/// Sidecars holding committed pages not yet written back to the main file.
/// `-shm` is rebuilt from the WAL when the copy is opened.
const SQLITE_PENDING_SIDECARS: [&str; 2] = ["-wal", "-journal"];

static SNAPSHOT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("shadow copy unavailable: {0}")]
    ShadowUnavailable(String),
}

/// A private copy of a source file. The copy, and any SQLite sidecar files
/// created next to it, are removed when the handle is dropped.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    source: PathBuf,
}

impl Snapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                debug!("snapshot cleanup failed for {}: {err}", self.path.display());
            }
        }
        for suffix in SQLITE_SIDECARS {
            let _ = std::fs::remove_file(with_suffix(&self.path, suffix));
        }
    }
}

pub struct SnapshotAcquirer {
    dir: PathBuf,
    log: Arc<AcquisitionLog>,
    shadow_fallback: bool,
}

impl SnapshotAcquirer {
    pub fn new(dir: Option<PathBuf>, log: Arc<AcquisitionLog>) -> Self {
        Self {
            dir: dir.unwrap_or_else(std::env::temp_dir),
            log,
            shadow_fallback: cfg!(windows),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `source` into a private snapshot.
    ///
    /// Returns `None` when the source does not exist or cannot be read by any
    /// means; failures are written to the acquisition log.
    pub fn acquire(&self, source: &Path) -> Option<Snapshot> {
        match std::fs::metadata(source) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return None,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return self.after_denied(source, &err.to_string());
            }
            Err(err) => {
                self.log
                    .error(format!("Error copying {}: {err}", source.display()));
                return None;
            }
        }

        match self.copy_direct(source) {
            Ok(snapshot) => Some(snapshot),
            Err(SnapshotError::AccessDenied(reason)) => self.after_denied(source, &reason),
            Err(err) => {
                self.log
                    .error(format!("Error copying {}: {err}", source.display()));
                None
            }
        }
    }

    fn after_denied(&self, source: &Path, reason: &str) -> Option<Snapshot> {
        if !self.shadow_fallback {
            self.log.error(format!(
                "[ACCESS DENIED] Permission denied copying {} ({reason})",
                source.display()
            ));
            return None;
        }
        self.log.note(format!(
            "Permission denied copying {}, trying VSS",
            source.display()
        ));
        match self.copy_from_shadow(source) {
            Ok(snapshot) => {
                self.log.note(format!(
                    "Recovered {} from shadow copy",
                    source.display()
                ));
                Some(snapshot)
            }
            Err(err) => {
                self.log.error(format!(
                    "[ACCESS DENIED] VSS fallback failed for {}: {err}",
                    source.display()
                ));
                None
            }
        }
    }

    fn copy_direct(&self, source: &Path) -> Result<Snapshot, SnapshotError> {
        let target = self.target_path("artifact", source);
        copy_into(source, &target)
    }

    fn copy_from_shadow(&self, source: &Path) -> Result<Snapshot, SnapshotError> {
        let output = std::process::Command::new("vssadmin")
            .args(["list", "shadows"])
            .stderr(std::process::Stdio::null())
            .output()
            .map_err(|e| SnapshotError::ShadowUnavailable(format!("vssadmin: {e}")))?;
        if !output.status.success() {
            return Err(SnapshotError::ShadowUnavailable(format!(
                "vssadmin exited with {}",
                output.status
            )));
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        let volumes = parse_shadow_volumes(&listing);
        if volumes.is_empty() {
            return Err(SnapshotError::ShadowUnavailable(
                "no shadow copies listed".to_string(),
            ));
        }

        // Listing order is creation order; prefer the newest shadow.
        for volume in volumes.iter().rev() {
            let candidate = shadow_candidate(volume, source);
            if candidate.is_file() {
                let target = self.target_path("vss", source);
                return copy_into(&candidate, &target).map(|mut snapshot| {
                    snapshot.source = source.to_path_buf();
                    snapshot
                });
            }
        }
        Err(SnapshotError::ShadowUnavailable(format!(
            "{} not present in {} shadow copies",
            source.display(),
            volumes.len()
        )))
    }

    fn target_path(&self, prefix: &str, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "source".to_string());
        let seq = SNAPSHOT_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{prefix}_{}_{seq}_{name}", std::process::id()))
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Copy `source` and its pending SQLite sidecars. The returned handle owns
/// every file written, so a failure part way cleans up through `Drop`.
fn copy_into(source: &Path, target: &Path) -> Result<Snapshot, SnapshotError> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let snapshot = Snapshot {
        path: target.to_path_buf(),
        source: source.to_path_buf(),
    };
    copy_file(source, target)?;
    for suffix in SQLITE_PENDING_SIDECARS {
        let sidecar = with_suffix(source, suffix);
        match std::fs::metadata(&sidecar) {
            Ok(meta) if meta.is_file() => copy_file(&sidecar, &with_suffix(target, suffix))?,
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Err(SnapshotError::AccessDenied(format!("{}: {err}", sidecar.display())));
            }
            Err(err) => return Err(SnapshotError::Io(err)),
        }
    }
    Ok(snapshot)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), SnapshotError> {
    match std::fs::copy(from, to) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            Err(SnapshotError::AccessDenied(format!("{}: {err}", from.display())))
        }
        Err(err) => Err(SnapshotError::Io(err)),
    }
}

/// Volume device paths from `vssadmin list shadows` output, in listing order.
pub fn parse_shadow_volumes(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let idx = line.find(SHADOW_VOLUME_MARKER)?;
            let volume = line[idx + SHADOW_VOLUME_MARKER.len()..].trim();
            (!volume.is_empty()).then(|| volume.to_string())
        })
        .collect()
}

/// Path of `source` inside a shadow volume: the drive prefix is dropped and
/// the remainder joined under the volume device path.
pub fn shadow_candidate(volume: &str, source: &Path) -> PathBuf {
    let mut candidate = PathBuf::from(format!("{}\\", volume.trim_end_matches('\\')));
    for component in source.components() {
        match component {
            Component::Normal(part) => candidate.push(part),
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                candidate.pop();
            }
        }
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "vssadmin 1.1 - Volume Shadow Copy Service administrative command-line tool\r\n\
        Contents of shadow copy set ID: {a}\r\n\
           Shadow Copy ID: {b}\r\n\
              Original Volume: (C:)\\\\?\\Volume{c}\\\r\n\
              Shadow Copy Volume: \\\\?\\GLOBALROOT\\Device\\HarddiskVolumeShadowCopy1\r\n\
        Contents of shadow copy set ID: {d}\r\n\
              Shadow Copy Volume: \\\\?\\GLOBALROOT\\Device\\HarddiskVolumeShadowCopy2\r\n";

    #[test]
    fn parses_shadow_volumes_in_order() {
        let volumes = parse_shadow_volumes(LISTING);
        assert_eq!(
            volumes,
            vec![
                "\\\\?\\GLOBALROOT\\Device\\HarddiskVolumeShadowCopy1",
                "\\\\?\\GLOBALROOT\\Device\\HarddiskVolumeShadowCopy2",
            ]
        );
        assert!(parse_shadow_volumes("no shadows here").is_empty());
    }

    #[test]
    fn shadow_candidate_drops_root() {
        let candidate = shadow_candidate("\\\\?\\GLOBALROOT\\Device\\Shadow1", Path::new("/Users/a/History"));
        let rendered = candidate.to_string_lossy().replace('/', "\\");
        assert!(rendered.starts_with("\\\\?\\GLOBALROOT\\Device\\Shadow1\\"));
        assert!(rendered.ends_with("Users\\a\\History"));
    }

    #[test]
    fn missing_source_is_silent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = Arc::new(AcquisitionLog::in_memory());
        let acquirer = SnapshotAcquirer::new(Some(dir.path().join("snap")), log.clone());
        assert!(acquirer.acquire(&dir.path().join("History")).is_none());
        assert!(log.lines().is_empty());
    }

    #[test]
    fn snapshot_is_private_copy_removed_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("History");
        std::fs::write(&source, b"SQLite format 3\0").expect("write");
        let log = Arc::new(AcquisitionLog::in_memory());
        let acquirer = SnapshotAcquirer::new(Some(dir.path().join("snap")), log);

        let snapshot = acquirer.acquire(&source).expect("snapshot");
        let copy = snapshot.path().to_path_buf();
        assert_ne!(copy, source);
        assert!(copy.file_name().unwrap().to_string_lossy().ends_with("_History"));
        assert!(
            copy.file_name()
                .unwrap()
                .to_string_lossy()
                .contains(&std::process::id().to_string())
        );
        assert_eq!(std::fs::read(&copy).expect("read"), b"SQLite format 3\0");

        std::fs::write(format!("{}-wal", copy.display()), b"wal").expect("sidecar");
        drop(snapshot);
        assert!(!copy.exists());
        assert!(!PathBuf::from(format!("{}-wal", copy.display())).exists());
        assert!(source.exists());
    }

    #[test]
    fn same_named_sources_do_not_collide() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a").join("History");
        let b = dir.path().join("b").join("History");
        for (path, body) in [(&a, b"first".as_slice()), (&b, b"second".as_slice())] {
            std::fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
            std::fs::write(path, body).expect("write");
        }
        let acquirer = SnapshotAcquirer::new(
            Some(dir.path().join("snap")),
            Arc::new(AcquisitionLog::in_memory()),
        );
        let first = acquirer.acquire(&a).expect("a");
        let second = acquirer.acquire(&b).expect("b");
        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).expect("read"), b"first");
        assert_eq!(std::fs::read(second.path()).expect("read"), b"second");
    }

    #[test]
    fn pending_wal_pages_travel_with_the_copy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("places.sqlite");
        let writer = rusqlite::Connection::open(&source).expect("open");
        let mode: String = writer
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .expect("wal");
        assert_eq!(mode.to_lowercase(), "wal");
        writer
            .execute_batch(
                "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT);
                 INSERT INTO moz_places (url) VALUES ('https://x.test');
                 INSERT INTO moz_places (url) VALUES ('https://recent.test');",
            )
            .expect("rows");
        assert!(with_suffix(&source, "-wal").exists());

        let snap_dir = dir.path().join("snap");
        let acquirer = SnapshotAcquirer::new(Some(snap_dir.clone()), Arc::new(AcquisitionLog::in_memory()));
        let snapshot = acquirer.acquire(&source).expect("snapshot");
        assert!(with_suffix(snapshot.path(), "-wal").exists());
        {
            let conn = crate::parsers::sqlite_db::open_read_only(snapshot.path()).expect("open copy");
            let urls: Vec<String> = conn
                .prepare("SELECT url FROM moz_places ORDER BY id")
                .expect("prepare")
                .query_map([], |row| row.get(0))
                .expect("query")
                .collect::<Result<_, _>>()
                .expect("rows");
            assert_eq!(urls, vec!["https://x.test", "https://recent.test"]);
        }
        drop(snapshot);
        drop(writer);
        assert!(std::fs::read_dir(&snap_dir).expect("dir").next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_source_is_logged_and_skipped() {
        use std::os::unix::fs::PermissionsExt;
        if unsafe { libc::geteuid() } == 0 {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("Cookies");
        std::fs::write(&source, b"data").expect("write");
        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o000)).expect("chmod");

        let log = Arc::new(AcquisitionLog::in_memory());
        let acquirer = SnapshotAcquirer::new(Some(dir.path().join("snap")), log.clone());
        assert!(acquirer.acquire(&source).is_none());
        let errors = log.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("ACCESS DENIED"));

        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o644)).expect("chmod");
    }
}
