//! Markdown summary of a run, rendered from the manifest.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::manifest::Manifest;

pub fn render(manifest: &Manifest) -> String {
    let meta = &manifest.metadata;
    let mut md = String::new();
    let _ = writeln!(md, "# Browser Artifact Report");
    let _ = writeln!(md);
    let _ = writeln!(md, "**Run**: {}  ", manifest.run_id);
    let _ = writeln!(md, "**Host**: {}  ", meta.hostname);
    let _ = writeln!(md, "**User**: {}  ", meta.username);
    let _ = writeln!(md, "**OS**: {}  ", meta.os);
    let _ = writeln!(md, "**Acquired at**: {}  ", meta.acquired_utc_string());
    let _ = writeln!(md, "**Tool version**: {}  ", manifest.tool_version);
    let _ = writeln!(md);

    let _ = writeln!(md, "## Artifact Counts");
    if manifest.counts.is_empty() {
        let _ = writeln!(md, "- none");
    }
    for (kind, count) in &manifest.counts {
        let _ = writeln!(md, "- {kind}: {count}");
    }
    let _ = writeln!(md);

    let _ = writeln!(md, "## Outputs");
    if manifest.outputs.is_empty() {
        let _ = writeln!(md, "- none");
    }
    for (path, digest) in &manifest.outputs {
        let digest = digest.as_deref().unwrap_or("unreadable");
        let _ = writeln!(md, "- {path} (SHA256={digest})");
    }
    let _ = writeln!(md);

    let _ = writeln!(md, "## Errors");
    let _ = writeln!(md, "{} error(s) or access-denied event(s) logged.", manifest.errors.len());
    md
}

pub fn write_report(path: &Path, manifest: &Manifest) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render(manifest)).with_context(|| format!("write report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::host::HostMetadata;
    use crate::parsers::browser::ArtifactKind;

    fn manifest() -> Manifest {
        let mut outputs = BTreeMap::new();
        outputs.insert("out.csv".to_string(), Some("ab12".to_string()));
        outputs.insert("gone.csv".to_string(), None);
        let mut counts = BTreeMap::new();
        counts.insert(ArtifactKind::History, 3);
        counts.insert(ArtifactKind::Cookie, 1);
        Manifest {
            run_id: "run1".into(),
            tool_version: "0.3.0".into(),
            metadata: HostMetadata {
                hostname: "ws01".into(),
                username: "analyst".into(),
                os: "linux".into(),
                acquired_utc: chrono::DateTime::from_timestamp(1_700_000_000, 0).expect("ts"),
            },
            outputs,
            counts,
            errors: vec!["Error cookie chrome".into()],
        }
    }

    #[test]
    fn lists_counts_outputs_and_errors() {
        let md = render(&manifest());
        assert!(md.starts_with("# Browser Artifact Report\n"));
        assert!(md.contains("**Host**: ws01  "));
        assert!(md.contains("**Acquired at**: 2023-11-14T22:13:20Z  "));
        assert!(md.contains("- history: 3"));
        assert!(md.contains("- cookie: 1"));
        assert!(md.contains("- out.csv (SHA256=ab12)"));
        assert!(md.contains("- gone.csv (SHA256=unreadable)"));
        assert!(md.contains("1 error(s)"));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("report.md");
        write_report(&path, &manifest()).expect("report");
        assert!(std::fs::read_to_string(&path).expect("read").contains("## Outputs"));
    }
}
