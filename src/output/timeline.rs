//! Unified timeline: every record that carries a timestamp, oldest first.

use std::path::Path;

use crate::output::{OutputError, TextSink};
use crate::parsers::browser::ArtifactRecord;

/// Stable sort, so records with equal timestamps keep extraction order.
pub fn timeline_records(records: &[ArtifactRecord]) -> Vec<&ArtifactRecord> {
    let mut timed: Vec<&ArtifactRecord> = records.iter().filter(|r| r.visit_time().is_some()).collect();
    timed.sort_by_key(|r| r.visit_time());
    timed
}

pub fn write_timeline(path: &Path, records: &[ArtifactRecord]) -> Result<usize, OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let timed = timeline_records(records);
    let mut sink = TextSink::create(path, false)?;
    crate::output::json::write_json(&mut sink, &timed)?;
    sink.finish()?;
    Ok(timed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_records::sample;
    use tempfile::tempdir;

    #[test]
    fn sorted_and_untimed_dropped() {
        let records = sample();
        let urls: Vec<&str> = timeline_records(&records).iter().map(|r| r.url()).collect();
        assert_eq!(urls, vec!["https://b.test", "https://d.test", "https://a.test"]);
    }

    #[test]
    fn writes_pretty_json() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("timeline.json");
        let n = write_timeline(&path, &sample()).expect("timeline");
        assert_eq!(n, 3);
        let rows: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(rows[0]["visit_time_utc"], "1970-01-01T00:01:40Z");
    }
}
