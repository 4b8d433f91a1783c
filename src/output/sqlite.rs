use std::path::Path;

use rusqlite::{Connection, params};

use crate::output::OutputError;
use crate::parsers::browser::{ArtifactRecord, ArtifactRow};

const TABLE: &str = "data";

/// Writes rows into table `data`, replacing any file already at `path`.
pub fn write_sqlite(path: &Path, records: &[&ArtifactRecord]) -> Result<(), OutputError> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let mut conn = Connection::open(path)?;
    let columns = ArtifactRow::COLUMNS
        .iter()
        .map(|col| match *col {
            "visit_count" => format!("{col} INTEGER"),
            _ => format!("{col} TEXT"),
        })
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!("CREATE TABLE {TABLE} ({columns})"))?;

    let placeholders = vec!["?"; ArtifactRow::COLUMNS.len()].join(", ");
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&format!("INSERT INTO {TABLE} VALUES ({placeholders})"))?;
        for record in records {
            let row = record.to_row();
            stmt.execute(params![
                row.hostname,
                row.username,
                row.os,
                row.acquired_utc,
                row.browser,
                row.artifact,
                row.profile,
                row.url,
                row.title,
                row.visit_count,
                row.visit_time_utc,
                row.extra,
                row.content.as_str(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}
