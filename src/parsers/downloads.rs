use std::path::Path;

use anyhow::{Result, bail};
use rusqlite::Connection;

use crate::parsers::browser::{ArtifactKind, ArtifactRecord, BrowserKind, BrowserProfile, RecordFields};
use crate::parsers::sqlite_db::{has_table, with_snapshot};
use crate::parsers::{ArtifactExtractor, ExtractionContext, each_firefox_profile, guarded};
use crate::time::{chromium_to_utc, mozilla_to_utc};

pub struct DownloadsExtractor;

impl ArtifactExtractor for DownloadsExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Download
    }

    fn extract(&self, profile: &BrowserProfile, ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord> {
        let mut out = Vec::new();
        let kind = self.kind();
        match profile.browser {
            BrowserKind::Chrome | BrowserKind::Edge => {
                guarded(ctx, kind, profile.browser, &profile.path, &mut out, |out| {
                    with_snapshot(ctx, &profile.path, |conn| {
                        extract_chromium_downloads(conn, profile.browser, profile.profile_dir(), ctx, out)
                    })
                });
            }
            BrowserKind::Firefox => {
                each_firefox_profile(ctx, kind, &profile.path, &mut out, |dir, out| {
                    with_snapshot(ctx, &dir.join("downloads.sqlite"), |conn| {
                        extract_firefox_downloads(conn, dir, ctx, out)
                    })
                });
            }
            BrowserKind::Safari => {}
        }
        out
    }
}

fn extract_chromium_downloads(
    conn: &Connection,
    browser: BrowserKind,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    for table in ["downloads", "downloads_url_chains"] {
        if !has_table(conn, table)? {
            bail!("missing table {table}");
        }
    }
    // Chain index 0 is the URL the download was first requested from.
    let mut stmt = conn.prepare(
        "SELECT downloads_url_chains.url, downloads.target_path, downloads.start_time \
         FROM downloads JOIN downloads_url_chains ON downloads.id = downloads_url_chains.id \
         WHERE downloads_url_chains.chain_index = 0 \
         ORDER BY downloads.id",
    )?;
    let rows = stmt.query_map([], |row| {
        let url: Option<String> = row.get(0)?;
        let target: Option<String> = row.get(1)?;
        let start_time: Option<i64> = row.get(2)?;
        Ok((url, target, start_time))
    })?;

    for row in rows {
        let (url, target, start_time) = row?;
        out.push(ArtifactRecord::new(
            ctx.host,
            browser,
            ArtifactKind::Download,
            profile_dir,
            RecordFields {
                url: url.unwrap_or_default(),
                title: target.unwrap_or_default(),
                visit_time: chromium_to_utc(start_time),
                ..RecordFields::default()
            },
        ));
    }
    Ok(())
}

fn extract_firefox_downloads(
    conn: &Connection,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let mut stmt = conn.prepare("SELECT source, target, startTime FROM moz_downloads")?;
    let rows = stmt.query_map([], |row| {
        let source: Option<String> = row.get(0)?;
        let target: Option<String> = row.get(1)?;
        let start_time: Option<i64> = row.get(2)?;
        Ok((source, target, start_time))
    })?;

    for row in rows {
        let (source, target, start_time) = row?;
        out.push(ArtifactRecord::new(
            ctx.host,
            BrowserKind::Firefox,
            ArtifactKind::Download,
            profile_dir,
            RecordFields {
                url: source.unwrap_or_default(),
                title: target.unwrap_or_default(),
                visit_time: mozilla_to_utc(start_time),
                ..RecordFields::default()
            },
        ));
    }
    Ok(())
}
