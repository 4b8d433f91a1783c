use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;

use crate::parsers::browser::{ArtifactKind, ArtifactRecord, BrowserKind, BrowserProfile, RecordFields};
use crate::parsers::sqlite_db::with_snapshot;
use crate::parsers::{ArtifactExtractor, ExtractionContext, each_firefox_profile, guarded};

pub const CHROMIUM_BOOKMARKS_FILE: &str = "Bookmarks";

/// A node of the Chromium bookmarks tree, discriminated by its `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BookmarkNode {
    Folder {
        #[serde(default)]
        name: String,
        #[serde(default)]
        children: Vec<BookmarkNode>,
    },
    Url {
        #[serde(default)]
        name: String,
        #[serde(default)]
        url: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct BookmarksFile {
    roots: serde_json::Map<String, serde_json::Value>,
}

/// A bookmark leaf with the folder path leading to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkEntry {
    pub name: String,
    pub url: String,
    pub folder: String,
}

/// Parse a Chromium `Bookmarks` document and return its URL leaves in
/// document order. Root entries that are not objects (e.g. the legacy
/// `sync_transaction_version` string) are skipped; an object that is not a
/// valid node is an error.
///
/// Nesting is bounded by serde_json's recursion limit of 128 levels. Each
/// folder costs two levels (the node and its `children` array), so a tree
/// more than about 60 folders deep is rejected as malformed instead of
/// exhausting the stack.
pub fn parse_bookmarks(json: &str) -> Result<Vec<BookmarkEntry>> {
    let file: BookmarksFile = serde_json::from_str(json).context("invalid bookmarks json")?;
    let mut roots = Vec::new();
    for (key, value) in file.roots {
        if !value.is_object() {
            continue;
        }
        let node = BookmarkNode::deserialize(value)
            .with_context(|| format!("malformed bookmark root {key}"))?;
        roots.push((key, node));
    }

    let mut entries = Vec::new();
    let mut stack: Vec<(String, BookmarkNode)> = roots.into_iter().rev().collect();
    while let Some((folder, node)) = stack.pop() {
        match node {
            BookmarkNode::Folder { name, children } => {
                let path = if folder.is_empty() {
                    name
                } else if name.is_empty() {
                    folder
                } else {
                    format!("{folder}/{name}")
                };
                for child in children.into_iter().rev() {
                    stack.push((path.clone(), child));
                }
            }
            BookmarkNode::Url { name, url } => entries.push(BookmarkEntry { name, url, folder }),
            BookmarkNode::Other => {}
        }
    }
    Ok(entries)
}

pub struct BookmarksExtractor;

impl ArtifactExtractor for BookmarksExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Bookmark
    }

    fn extract(&self, profile: &BrowserProfile, ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord> {
        let mut out = Vec::new();
        let kind = self.kind();
        match profile.browser {
            BrowserKind::Chrome | BrowserKind::Edge => {
                let file = profile.profile_dir().join(CHROMIUM_BOOKMARKS_FILE);
                if !file.is_file() {
                    return out;
                }
                guarded(ctx, kind, profile.browser, &file, &mut out, |out| {
                    let json = std::fs::read_to_string(&file)?;
                    for entry in parse_bookmarks(&json)? {
                        out.push(ArtifactRecord::new(
                            ctx.host,
                            profile.browser,
                            kind,
                            profile.profile_dir(),
                            RecordFields {
                                url: entry.url,
                                title: entry.name,
                                extra: if entry.folder.is_empty() {
                                    String::new()
                                } else {
                                    format!("folder={}", entry.folder)
                                },
                                ..RecordFields::default()
                            },
                        ));
                    }
                    ctx.log.note(format!("Bookmarks extracted from {}", file.display()));
                    Ok(())
                });
            }
            BrowserKind::Firefox => {
                each_firefox_profile(ctx, kind, &profile.path, &mut out, |dir, out| {
                    with_snapshot(ctx, &dir.join("places.sqlite"), |conn| {
                        extract_firefox_titled_places(conn, dir, ctx, out)
                    })
                });
            }
            BrowserKind::Safari => {}
        }
        out
    }
}

fn extract_firefox_titled_places(
    conn: &Connection,
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let mut stmt = conn.prepare("SELECT url, title FROM moz_places WHERE title IS NOT NULL")?;
    let rows = stmt.query_map([], |row| {
        let url: Option<String> = row.get(0)?;
        let title: String = row.get(1)?;
        Ok((url, title))
    })?;
    for row in rows {
        let (url, title) = row?;
        out.push(ArtifactRecord::new(
            ctx.host,
            BrowserKind::Firefox,
            ArtifactKind::Bookmark,
            profile_dir,
            RecordFields {
                url: url.unwrap_or_default(),
                title,
                ..RecordFields::default()
            },
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::test_support::{Harness, create_db};
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "checksum": "abc",
        "roots": {
            "bookmark_bar": {
                "type": "folder", "name": "Bookmarks bar",
                "children": [
                    {"type": "url", "name": "Rust", "url": "https://rust-lang.org"},
                    {"type": "folder", "name": "Work", "children": [
                        {"type": "url", "url": "https://intranet.test"}
                    ]},
                    {"type": "separator"}
                ]
            },
            "other": {"type": "folder", "name": "Other bookmarks", "children": []},
            "sync_transaction_version": "7"
        },
        "version": 1
    }"#;

    #[test]
    fn walks_tree_in_document_order() {
        let entries = parse_bookmarks(SAMPLE).expect("parse");
        assert_eq!(
            entries,
            vec![
                BookmarkEntry {
                    name: "Rust".into(),
                    url: "https://rust-lang.org".into(),
                    folder: "Bookmarks bar".into(),
                },
                BookmarkEntry {
                    name: String::new(),
                    url: "https://intranet.test".into(),
                    folder: "Bookmarks bar/Work".into(),
                },
            ]
        );
    }

    #[test]
    fn nested_folders_flatten() {
        let depth = 40;
        let mut json = String::from(r#"{"roots":{"bookmark_bar":"#);
        for _ in 0..depth {
            json.push_str(r#"{"type":"folder","name":"f","children":["#);
        }
        json.push_str(r#"{"type":"url","name":"deep","url":"https://deep.test"}"#);
        for _ in 0..depth {
            json.push_str("]}");
        }
        json.push_str("}}");

        let entries = parse_bookmarks(&json).expect("parse");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].folder.split('/').count(), depth);
    }

    #[test]
    fn overly_deep_tree_is_rejected() {
        let depth = 100;
        let mut json = String::from(r#"{"roots":{"bookmark_bar":"#);
        for _ in 0..depth {
            json.push_str(r#"{"type":"folder","name":"f","children":["#);
        }
        json.push_str(r#"{"type":"url","name":"deep","url":"https://deep.test"}"#);
        for _ in 0..depth {
            json.push_str("]}");
        }
        json.push_str("}}");

        let err = parse_bookmarks(&json).expect_err("too deep");
        assert!(format!("{err:#}").contains("recursion limit"));
    }

    #[test]
    fn malformed_node_is_typed_error() {
        let json = r#"{"roots":{"bookmark_bar":{"type":"folder","children":"not-a-list"}}}"#;
        let err = parse_bookmarks(json).expect_err("should fail");
        assert!(format!("{err:#}").contains("bookmark_bar"));
        assert!(parse_bookmarks("[1, 2").is_err());
    }

    #[test]
    fn chrome_bookmarks_become_records() {
        let dir = tempdir().expect("tempdir");
        let profile_dir = dir.path().join("Default");
        std::fs::create_dir_all(&profile_dir).expect("mkdir");
        std::fs::write(profile_dir.join("Bookmarks"), SAMPLE).expect("write");
        let harness = Harness::new(&dir.path().join("snap"));

        let records = BookmarksExtractor.extract(
            &BrowserProfile::new(BrowserKind::Chrome, profile_dir.join("History")),
            &harness.ctx(),
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].artifact(), ArtifactKind::Bookmark);
        assert_eq!(records[0].title(), "Rust");
        assert_eq!(records[1].title(), "");
        assert_eq!(records[1].extra(), "folder=Bookmarks bar/Work");
        assert!(records[0].visit_count().is_none());
    }

    #[test]
    fn missing_bookmarks_file_is_silent() {
        let dir = tempdir().expect("tempdir");
        let harness = Harness::new(&dir.path().join("snap"));
        let records = BookmarksExtractor.extract(
            &BrowserProfile::new(BrowserKind::Edge, dir.path().join("Default").join("History")),
            &harness.ctx(),
        );
        assert!(records.is_empty());
        assert!(harness.log.lines().is_empty());
    }

    #[test]
    fn firefox_titled_places_only() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join("Profiles");
        create_db(
            &root.join("x.default").join("places.sqlite"),
            &[
                "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT, title TEXT)",
                "INSERT INTO moz_places (url, title) VALUES ('https://titled.test', 'Titled')",
                "INSERT INTO moz_places (url, title) VALUES ('https://untitled.test', NULL)",
            ],
        );
        let harness = Harness::new(&dir.path().join("snap"));
        let records =
            BookmarksExtractor.extract(&BrowserProfile::new(BrowserKind::Firefox, &root), &harness.ctx());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url(), "https://titled.test");
    }
}
