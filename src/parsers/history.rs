use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::parsers::browser::{ArtifactKind, ArtifactRecord, BrowserKind, BrowserProfile, RecordFields};
use crate::parsers::sqlite_db::with_snapshot;
use crate::parsers::{ArtifactExtractor, ExtractionContext, each_firefox_profile, guarded};
use crate::time::{chromium_to_utc, cocoa_to_utc, mozilla_to_utc};

pub struct HistoryExtractor;

impl ArtifactExtractor for HistoryExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::History
    }

    fn extract(&self, profile: &BrowserProfile, ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord> {
        let mut out = Vec::new();
        let kind = self.kind();
        match profile.browser {
            BrowserKind::Chrome | BrowserKind::Edge => {
                guarded(ctx, kind, profile.browser, &profile.path, &mut out, |out| {
                    with_snapshot(ctx, &profile.path, |conn| {
                        extract_chromium_urls(conn, profile.browser, profile.profile_dir(), ctx, out)
                    })?;
                    ctx.log
                        .note(format!("History extracted from {}", profile.path.display()));
                    Ok(())
                });
            }
            BrowserKind::Firefox => {
                each_firefox_profile(ctx, kind, &profile.path, &mut out, |dir, out| {
                    let db = dir.join("places.sqlite");
                    with_snapshot(ctx, &db, |conn| extract_firefox_places(conn, dir, ctx, out))?;
                    ctx.log.note(format!("History extracted from {}", db.display()));
                    Ok(())
                });
            }
            BrowserKind::Safari => {
                guarded(ctx, kind, profile.browser, &profile.path, &mut out, |out| {
                    with_snapshot(ctx, &profile.path, |conn| {
                        extract_safari_items(conn, profile.profile_dir(), ctx, out)
                    })
                });
            }
        }
        out
    }
}

fn extract_chromium_urls(
    conn: &Connection,
    browser: BrowserKind,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let mut stmt = conn.prepare("SELECT url, title, visit_count, last_visit_time FROM urls")?;
    let rows = stmt.query_map([], |row| {
        let url: Option<String> = row.get(0)?;
        let title: Option<String> = row.get(1)?;
        let visit_count: Option<i64> = row.get(2)?;
        let last_visit_time: Option<i64> = row.get(3)?;
        Ok((url, title, visit_count, last_visit_time))
    })?;

    for row in rows {
        let (url, title, visit_count, last_visit_time) = row?;
        out.push(ArtifactRecord::new(
            ctx.host,
            browser,
            ArtifactKind::History,
            profile_dir,
            RecordFields {
                url: url.unwrap_or_default(),
                title: title.unwrap_or_default(),
                visit_count,
                visit_time: chromium_to_utc(last_visit_time),
                extra: String::new(),
            },
        ));
    }
    Ok(())
}

fn extract_firefox_places(
    conn: &Connection,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let mut stmt = conn.prepare("SELECT url, title, visit_count, last_visit_date FROM moz_places")?;
    let rows = stmt.query_map([], |row| {
        let url: Option<String> = row.get(0)?;
        let title: Option<String> = row.get(1)?;
        let visit_count: Option<i64> = row.get(2)?;
        let last_visit_date: Option<i64> = row.get(3)?;
        Ok((url, title, visit_count, last_visit_date))
    })?;

    for row in rows {
        let (url, title, visit_count, last_visit_date) = row?;
        out.push(ArtifactRecord::new(
            ctx.host,
            BrowserKind::Firefox,
            ArtifactKind::History,
            profile_dir,
            RecordFields {
                url: url.unwrap_or_default(),
                title: title.unwrap_or_default(),
                visit_count,
                visit_time: mozilla_to_utc(last_visit_date),
                extra: String::new(),
            },
        ));
    }
    Ok(())
}

fn extract_safari_items(
    conn: &Connection,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT history_items.url, \
                (SELECT title FROM history_visits WHERE history_item = history_items.id \
                 ORDER BY visit_time DESC LIMIT 1), \
                history_items.visit_count, \
                (SELECT MAX(visit_time) FROM history_visits WHERE history_item = history_items.id) \
         FROM history_items",
    )?;
    let rows = stmt.query_map([], |row| {
        let url: Option<String> = row.get(0)?;
        let title: Option<String> = row.get(1)?;
        let visit_count: Option<i64> = row.get(2)?;
        let visit_time: Option<f64> = row.get(3)?;
        Ok((url, title, visit_count, visit_time))
    })?;

    for row in rows {
        let (url, title, visit_count, visit_time) = row?;
        out.push(ArtifactRecord::new(
            ctx.host,
            BrowserKind::Safari,
            ArtifactKind::History,
            profile_dir,
            RecordFields {
                url: url.unwrap_or_default(),
                title: title.unwrap_or_default(),
                visit_count,
                visit_time: cocoa_to_utc(visit_time),
                extra: String::new(),
            },
        ));
    }
    Ok(())
}
