use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::parsers::browser::{ArtifactKind, ArtifactRecord, BrowserKind, BrowserProfile, RecordFields};
use crate::parsers::sqlite_db::{has_column, with_snapshot};
use crate::parsers::{ArtifactExtractor, ExtractionContext, each_firefox_profile, guarded};
use crate::time::mozilla_to_utc;

pub struct SearchesExtractor;

impl ArtifactExtractor for SearchesExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Search
    }

    fn extract(&self, profile: &BrowserProfile, ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord> {
        let mut out = Vec::new();
        let kind = self.kind();
        match profile.browser {
            BrowserKind::Chrome | BrowserKind::Edge => {
                guarded(ctx, kind, profile.browser, &profile.path, &mut out, |out| {
                    with_snapshot(ctx, &profile.path, |conn| {
                        extract_keyword_terms(conn, profile.browser, profile.profile_dir(), ctx, out)
                    })
                });
            }
            BrowserKind::Firefox => {
                each_firefox_profile(ctx, kind, &profile.path, &mut out, |dir, out| {
                    with_snapshot(ctx, &dir.join("formhistory.sqlite"), |conn| {
                        extract_form_history(conn, dir, ctx, out)
                    })
                });
            }
            BrowserKind::Safari => {}
        }
        out
    }
}

fn extract_keyword_terms(
    conn: &Connection,
    browser: BrowserKind,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let mut stmt = conn.prepare("SELECT term, url_id FROM keyword_search_terms")?;
    let rows = stmt.query_map([], |row| {
        let term: Option<String> = row.get(0)?;
        let url_id: Option<i64> = row.get(1)?;
        Ok((term, url_id))
    })?;

    for row in rows {
        let (term, url_id) = row?;
        let url = url_id.map(|id| format!("url_id={id}")).unwrap_or_default();
        out.push(ArtifactRecord::new(
            ctx.host,
            browser,
            ArtifactKind::Search,
            profile_dir,
            RecordFields {
                url,
                title: term.unwrap_or_default(),
                ..RecordFields::default()
            },
        ));
    }
    Ok(())
}

fn extract_form_history(
    conn: &Connection,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let sql = if has_column(conn, "moz_formhistory", "lastUsed")? {
        "SELECT fieldname, value, timesUsed, lastUsed FROM moz_formhistory"
    } else {
        "SELECT fieldname, value, timesUsed, NULL FROM moz_formhistory"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        let field: Option<String> = row.get(0)?;
        let value: Option<String> = row.get(1)?;
        let times_used: Option<i64> = row.get(2)?;
        let last_used: Option<i64> = row.get(3)?;
        Ok((field, value, times_used, last_used))
    })?;

    for row in rows {
        let (field, value, times_used, last_used) = row?;
        out.push(ArtifactRecord::new(
            ctx.host,
            BrowserKind::Firefox,
            ArtifactKind::Search,
            profile_dir,
            RecordFields {
                url: String::new(),
                title: value.unwrap_or_default(),
                visit_count: times_used,
                visit_time: mozilla_to_utc(last_used),
                extra: format!("field={}", field.unwrap_or_default()),
            },
        ));
    }
    Ok(())
}
