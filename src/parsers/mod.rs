//! # Artefact Parsers
//!
//! One extractor per artefact kind. Every extractor takes a discovered
//! profile and returns the records it could read; failures are written to the
//! acquisition log and never reach the caller, so one broken source cannot
//! stop the others.

pub mod bookmarks;
pub mod browser;
pub mod cookies;
pub mod downloads;
pub mod extensions;
pub mod history;
pub mod searches;
pub mod sessions;
pub mod sqlite_db;

use std::path::Path;

use anyhow::Result;

use crate::host::HostMetadata;
use crate::logging::AcquisitionLog;
use crate::snapshot::SnapshotAcquirer;

use browser::{ArtifactKind, ArtifactRecord, BrowserKind, BrowserProfile};

pub struct ExtractionContext<'a> {
    pub host: &'a HostMetadata,
    pub snapshots: &'a SnapshotAcquirer,
    pub log: &'a AcquisitionLog,
}

impl<'a> std::fmt::Debug for ExtractionContext<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionContext")
            .field("host", &self.host)
            .field("snapshot_dir", &self.snapshots.dir())
            .field("log", &"<AcquisitionLog>")
            .finish()
    }
}

pub trait ArtifactExtractor: Send + Sync {
    fn kind(&self) -> ArtifactKind;
    fn extract(&self, profile: &BrowserProfile, ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord>;
}

/// Every extractor, in the order they run against a profile.
pub fn default_extractors() -> Vec<Box<dyn ArtifactExtractor>> {
    vec![
        Box::new(history::HistoryExtractor),
        Box::new(bookmarks::BookmarksExtractor),
        Box::new(cookies::CookiesExtractor),
        Box::new(downloads::DownloadsExtractor),
        Box::new(searches::SearchesExtractor),
        Box::new(sessions::SessionsExtractor),
        Box::new(extensions::ExtensionsExtractor),
    ]
}

/// Run one source extraction, logging its failure with the artefact, browser
/// and path. Records pushed before the failure are kept.
pub(crate) fn guarded<F>(
    ctx: &ExtractionContext<'_>,
    kind: ArtifactKind,
    browser: BrowserKind,
    path: &Path,
    out: &mut Vec<ArtifactRecord>,
    f: F,
) where
    F: FnOnce(&mut Vec<ArtifactRecord>) -> Result<()>,
{
    if let Err(err) = f(out) {
        ctx.log.error(format!(
            "Error {kind} {browser} {}: {err:#}",
            path.display()
        ));
    }
}

/// Run `f` for every `*.default*` profile under a Firefox profiles root.
pub(crate) fn each_firefox_profile<F>(
    ctx: &ExtractionContext<'_>,
    kind: ArtifactKind,
    root: &Path,
    out: &mut Vec<ArtifactRecord>,
    mut f: F,
) where
    F: FnMut(&Path, &mut Vec<ArtifactRecord>) -> Result<()>,
{
    let profiles = match sqlite_db::firefox_profiles(root) {
        Ok(profiles) => profiles,
        Err(err) => {
            ctx.log.error(format!(
                "Error {kind} {} {}: {err}",
                BrowserKind::Firefox,
                root.display()
            ));
            return;
        }
    };
    for profile_dir in profiles {
        guarded(ctx, kind, BrowserKind::Firefox, &profile_dir, out, |out| {
            f(&profile_dir, out)
        });
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use rusqlite::Connection;

    use super::ExtractionContext;
    use crate::host::HostMetadata;
    use crate::logging::AcquisitionLog;
    use crate::snapshot::SnapshotAcquirer;

    pub struct Harness {
        pub host: HostMetadata,
        pub snapshots: SnapshotAcquirer,
        pub log: Arc<AcquisitionLog>,
    }

    impl Harness {
        pub fn new(snapshot_dir: &Path) -> Self {
            let log = Arc::new(AcquisitionLog::in_memory());
            Self {
                host: HostMetadata {
                    hostname: "ws01".into(),
                    username: "analyst".into(),
                    os: "linux-x86_64-unix".into(),
                    acquired_utc: chrono::DateTime::from_timestamp(1_700_000_000, 0).expect("ts"),
                },
                snapshots: SnapshotAcquirer::new(Some(snapshot_dir.to_path_buf()), log.clone()),
                log,
            }
        }

        pub fn ctx(&self) -> ExtractionContext<'_> {
            ExtractionContext {
                host: &self.host,
                snapshots: &self.snapshots,
                log: &self.log,
            }
        }
    }

    pub fn create_db(path: &Path, statements: &[&str]) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        let conn = Connection::open(path).expect("conn");
        for sql in statements {
            conn.execute_batch(sql).expect("sql");
        }
    }

    pub fn snapshot_dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_extractor_per_artifact_kind() {
        let kinds: Vec<ArtifactKind> = default_extractors().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, ArtifactKind::ALL.to_vec());
    }
}
