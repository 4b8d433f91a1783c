use std::path::{Path, PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::parsers::browser::{ArtifactKind, ArtifactRecord, BrowserKind, BrowserProfile, RecordFields};
use crate::parsers::sqlite_db::{has_column, with_snapshot};
use crate::parsers::{ArtifactExtractor, ExtractionContext, each_firefox_profile, guarded};
use crate::time::{chromium_to_utc, mozilla_to_utc};

/// Stand-in for cookie values that Chromium stored encrypted.
pub const REDACTED_VALUE: &str = "<encrypted>";

// Chromium prefixes OS-encrypted values with a version tag: v10, v11, v20.
static VERSIONED_CIPHERTEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v\d\d").expect("static regex"));

pub fn is_versioned_ciphertext(value: &[u8]) -> bool {
    VERSIONED_CIPHERTEXT.is_match(value)
}

/// Cookie store of a Chromium profile; newer builds keep it under `Network/`.
fn chromium_cookie_store(profile_dir: &Path) -> Option<PathBuf> {
    [profile_dir.join("Network").join("Cookies"), profile_dir.join("Cookies")]
        .into_iter()
        .find(|path| path.exists())
}

pub struct CookiesExtractor;

impl ArtifactExtractor for CookiesExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Cookie
    }

    fn extract(&self, profile: &BrowserProfile, ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord> {
        let mut out = Vec::new();
        let kind = self.kind();
        match profile.browser {
            BrowserKind::Chrome | BrowserKind::Edge => {
                let Some(store) = chromium_cookie_store(profile.profile_dir()) else {
                    return out;
                };
                guarded(ctx, kind, profile.browser, &store, &mut out, |out| {
                    with_snapshot(ctx, &store, |conn| {
                        extract_chromium_cookies(conn, profile.browser, profile.profile_dir(), ctx, out)
                    })
                });
            }
            BrowserKind::Firefox => {
                each_firefox_profile(ctx, kind, &profile.path, &mut out, |dir, out| {
                    with_snapshot(ctx, &dir.join("cookies.sqlite"), |conn| {
                        extract_firefox_cookies(conn, dir, ctx, out)
                    })
                });
            }
            BrowserKind::Safari => {}
        }
        out
    }
}

fn value_bytes(value: ValueRef<'_>) -> Vec<u8> {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => bytes.to_vec(),
        ValueRef::Integer(i) => i.to_string().into_bytes(),
        ValueRef::Real(f) => f.to_string().into_bytes(),
        ValueRef::Null => Vec::new(),
    }
}

/// Cookie value as emitted: plaintext, or the redaction marker when the
/// stored bytes are Chromium ciphertext.
fn chromium_cookie_value(value: &[u8], encrypted: &[u8]) -> String {
    if is_versioned_ciphertext(value) || (value.is_empty() && !encrypted.is_empty()) {
        REDACTED_VALUE.to_string()
    } else {
        String::from_utf8_lossy(value).to_string()
    }
}

fn extract_chromium_cookies(
    conn: &Connection,
    browser: BrowserKind,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let sql = if has_column(conn, "cookies", "encrypted_value")? {
        "SELECT host_key, name, value, last_access_utc, encrypted_value FROM cookies"
    } else {
        "SELECT host_key, name, value, last_access_utc, NULL FROM cookies"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        let host: Option<String> = row.get(0)?;
        let name: Option<String> = row.get(1)?;
        let value = value_bytes(row.get_ref(2)?);
        let last_access: Option<i64> = row.get(3)?;
        let encrypted = value_bytes(row.get_ref(4)?);
        Ok((host, name, value, last_access, encrypted))
    })?;

    for row in rows {
        let (host, name, value, last_access, encrypted) = row?;
        let value = chromium_cookie_value(&value, &encrypted);
        out.push(ArtifactRecord::new(
            ctx.host,
            browser,
            ArtifactKind::Cookie,
            profile_dir,
            RecordFields {
                url: host.unwrap_or_default(),
                title: name.unwrap_or_default(),
                visit_count: None,
                visit_time: chromium_to_utc(last_access),
                extra: format!("value={value}"),
            },
        ));
    }
    Ok(())
}

fn extract_firefox_cookies(
    conn: &Connection,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let mut stmt = conn.prepare("SELECT host, name, value, lastAccessed FROM moz_cookies")?;
    let rows = stmt.query_map([], |row| {
        let host: Option<String> = row.get(0)?;
        let name: Option<String> = row.get(1)?;
        let value = value_bytes(row.get_ref(2)?);
        let last_accessed: Option<i64> = row.get(3)?;
        Ok((host, name, value, last_accessed))
    })?;

    for row in rows {
        let (host, name, value, last_accessed) = row?;
        out.push(ArtifactRecord::new(
            ctx.host,
            BrowserKind::Firefox,
            ArtifactKind::Cookie,
            profile_dir,
            RecordFields {
                url: host.unwrap_or_default(),
                title: name.unwrap_or_default(),
                visit_count: None,
                visit_time: mozilla_to_utc(last_accessed),
                extra: format!("value={}", String::from_utf8_lossy(&value)),
            },
        ));
    }
    Ok(())
}
