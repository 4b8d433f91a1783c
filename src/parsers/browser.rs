use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::host::HostMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Edge => "edge",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Safari => "safari",
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    History,
    Bookmark,
    Cookie,
    Download,
    Search,
    Session,
    Extension,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::History,
        ArtifactKind::Bookmark,
        ArtifactKind::Cookie,
        ArtifactKind::Download,
        ArtifactKind::Search,
        ArtifactKind::Session,
        ArtifactKind::Extension,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::History => "history",
            ArtifactKind::Bookmark => "bookmark",
            ArtifactKind::Cookie => "cookie",
            ArtifactKind::Download => "download",
            ArtifactKind::Search => "search",
            ArtifactKind::Session => "session",
            ArtifactKind::Extension => "extension",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered browser installation for one user.
///
/// For Chromium browsers and Safari `path` is the primary history database;
/// for Firefox it is the profiles root, which holds one directory per profile.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BrowserProfile {
    pub browser: BrowserKind,
    pub path: PathBuf,
}

impl BrowserProfile {
    pub fn new(browser: BrowserKind, path: impl Into<PathBuf>) -> Self {
        Self {
            browser,
            path: path.into(),
        }
    }

    /// Directory holding the profile's sibling artefact files.
    pub fn profile_dir(&self) -> &Path {
        match self.browser {
            BrowserKind::Firefox => &self.path,
            _ => self.path.parent().unwrap_or(&self.path),
        }
    }
}

/// Whether a record carries parsed data or only flags a source that exists
/// in a format this tool does not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordContent {
    Parsed,
    UnsupportedFormat,
}

impl RecordContent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordContent::Parsed => "parsed",
            RecordContent::UnsupportedFormat => "unsupported_format",
        }
    }
}

/// Artefact-specific fields of a record.
#[derive(Debug, Clone, Default)]
pub struct RecordFields {
    pub url: String,
    pub title: String,
    pub visit_count: Option<i64>,
    pub visit_time: Option<DateTime<Utc>>,
    pub extra: String,
}

/// One extracted artefact, self-describing and immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRecord {
    host: HostMetadata,
    browser: BrowserKind,
    artifact: ArtifactKind,
    profile: PathBuf,
    url: String,
    title: String,
    visit_count: Option<i64>,
    visit_time: Option<DateTime<Utc>>,
    extra: String,
    content: RecordContent,
}

impl ArtifactRecord {
    pub fn new(
        host: &HostMetadata,
        browser: BrowserKind,
        artifact: ArtifactKind,
        profile: &Path,
        fields: RecordFields,
    ) -> Self {
        Self {
            host: host.clone(),
            browser,
            artifact,
            profile: profile.to_path_buf(),
            url: fields.url,
            title: fields.title,
            visit_count: fields.visit_count,
            visit_time: fields.visit_time,
            extra: fields.extra,
            content: RecordContent::Parsed,
        }
    }

    /// A placeholder for a source that exists but is not decoded.
    pub fn unsupported(
        host: &HostMetadata,
        browser: BrowserKind,
        artifact: ArtifactKind,
        profile: &Path,
        marker: &str,
        detail: String,
    ) -> Self {
        Self {
            host: host.clone(),
            browser,
            artifact,
            profile: profile.to_path_buf(),
            url: marker.to_string(),
            title: String::new(),
            visit_count: None,
            visit_time: None,
            extra: detail,
            content: RecordContent::UnsupportedFormat,
        }
    }

    pub fn host(&self) -> &HostMetadata {
        &self.host
    }

    pub fn browser(&self) -> BrowserKind {
        self.browser
    }

    pub fn artifact(&self) -> ArtifactKind {
        self.artifact
    }

    pub fn profile(&self) -> &Path {
        &self.profile
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn visit_count(&self) -> Option<i64> {
        self.visit_count
    }

    pub fn visit_time(&self) -> Option<DateTime<Utc>> {
        self.visit_time
    }

    pub fn extra(&self) -> &str {
        &self.extra
    }

    pub fn content(&self) -> RecordContent {
        self.content
    }

    pub fn to_row(&self) -> ArtifactRow<'_> {
        ArtifactRow {
            hostname: &self.host.hostname,
            username: &self.host.username,
            os: &self.host.os,
            acquired_utc: self.host.acquired_utc_string(),
            browser: self.browser.as_str(),
            artifact: self.artifact.as_str(),
            profile: self.profile.to_string_lossy().to_string(),
            url: &self.url,
            title: &self.title,
            visit_count: self.visit_count,
            visit_time_utc: self.visit_time.as_ref().map(crate::time::format_utc),
            extra: &self.extra,
            content: self.content,
        }
    }
}

impl Serialize for ArtifactRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_row().serialize(serializer)
    }
}

/// Flat serialized shape of a record, shared by every output backend.
#[derive(Debug, Serialize)]
pub struct ArtifactRow<'a> {
    pub hostname: &'a str,
    pub username: &'a str,
    pub os: &'a str,
    pub acquired_utc: String,
    pub browser: &'a str,
    pub artifact: &'a str,
    pub profile: String,
    pub url: &'a str,
    pub title: &'a str,
    pub visit_count: Option<i64>,
    pub visit_time_utc: Option<String>,
    pub extra: &'a str,
    pub content: RecordContent,
}

impl ArtifactRow<'_> {
    pub const COLUMNS: [&'static str; 13] = [
        "hostname",
        "username",
        "os",
        "acquired_utc",
        "browser",
        "artifact",
        "profile",
        "url",
        "title",
        "visit_count",
        "visit_time_utc",
        "extra",
        "content",
    ];
}
