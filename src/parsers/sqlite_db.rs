use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::parsers::ExtractionContext;

pub fn open_read_only(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("open {}", path.display()))?;
    Ok(conn)
}

pub fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
    let mut rows = stmt.query([name])?;
    Ok(rows.next()?.is_some())
}

pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let rows = stmt.query_map([table], |row| row.get::<_, String>(0))?;
    for name in rows {
        if name?.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Snapshot `source` and run `query` against the private copy.
///
/// A source that does not exist, or that could not be copied, is skipped
/// with `Ok(())`; the snapshot layer has already logged any failure.
pub fn with_snapshot<F>(ctx: &ExtractionContext<'_>, source: &Path, query: F) -> Result<()>
where
    F: FnOnce(&Connection) -> Result<()>,
{
    let Some(snapshot) = ctx.snapshots.acquire(source) else {
        return Ok(());
    };
    debug!(
        "querying {} (snapshot of {})",
        snapshot.path().display(),
        snapshot.source().display()
    );
    let conn = open_read_only(snapshot.path())?;
    let result = query(&conn);
    // The connection must be closed before the snapshot file is removed.
    drop(conn);
    drop(snapshot);
    result
}

/// Firefox profile directories under a profiles root (`*.default*`).
///
/// A missing root has no profiles; any other listing failure is returned.
pub fn firefox_profiles(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut profiles: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().contains(".default"))
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    profiles.sort();
    Ok(profiles)
}
