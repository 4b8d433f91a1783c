//! Shared fixtures: a fake Linux users root with one Chrome and one Firefox
//! profile, built from on-the-fly SQLite databases.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;

use frostveil::discovery::{DiscoveredProfiles, Platform, ProfileDiscovery};
use frostveil::host::HostMetadata;
use frostveil::logging::AcquisitionLog;

/// 2022-06-18T04:26:40Z in Chromium microseconds since 1601.
pub const CHROME_VISIT: i64 = 13_300_000_000_000_000;
/// 2023-11-14T22:13:20Z in Mozilla microseconds since 1970.
pub const FIREFOX_VISIT: i64 = 1_700_000_000_000_000;

pub fn create_db(path: &Path, statements: &[&str]) {
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    let conn = Connection::open(path).expect("open db");
    for sql in statements {
        conn.execute_batch(sql).expect("sql");
    }
}

pub fn host() -> HostMetadata {
    HostMetadata {
        hostname: "ws01".into(),
        username: "analyst".into(),
        os: "linux-x86_64-unix".into(),
        acquired_utc: chrono::DateTime::from_timestamp(1_700_000_000, 0).expect("ts"),
    }
}

pub fn chrome_default(users_root: &Path) -> PathBuf {
    users_root
        .join("alice")
        .join(".config")
        .join("google-chrome")
        .join("Default")
}

pub fn firefox_profile(users_root: &Path) -> PathBuf {
    users_root
        .join("alice")
        .join(".mozilla")
        .join("firefox")
        .join("x1y2.default-release")
}

/// One Chrome profile (with a malformed `Bookmarks` file) and one Firefox
/// profile for user `alice`.
pub fn build_users_root(users_root: &Path) {
    let chrome = chrome_default(users_root);
    create_db(
        &chrome.join("History"),
        &[
            "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT, \
             visit_count INTEGER, last_visit_time INTEGER)",
            &format!(
                "INSERT INTO urls (url, title, visit_count, last_visit_time) \
                 VALUES ('https://example.com', 'Example', 3, {CHROME_VISIT})"
            ),
            "CREATE TABLE downloads (id INTEGER PRIMARY KEY, target_path TEXT, start_time INTEGER)",
            "CREATE TABLE downloads_url_chains (id INTEGER, chain_index INTEGER, url TEXT)",
            &format!("INSERT INTO downloads VALUES (1, '/home/alice/Downloads/a.zip', {CHROME_VISIT})"),
            "INSERT INTO downloads_url_chains VALUES (1, 0, 'https://dl.example.com/a.zip')",
            "CREATE TABLE keyword_search_terms (keyword_id INTEGER, url_id INTEGER, term TEXT)",
            "INSERT INTO keyword_search_terms VALUES (1, 1, 'example')",
        ],
    );
    std::fs::write(chrome.join("Bookmarks"), "{ this is not json").expect("bookmarks");
    create_db(
        &chrome.join("Network").join("Cookies"),
        &[
            "CREATE TABLE cookies (host_key TEXT, name TEXT, value TEXT, \
             last_access_utc INTEGER, encrypted_value BLOB)",
            &format!(
                "INSERT INTO cookies VALUES ('.example.com', 'sid', '', {CHROME_VISIT}, X'763130AABB')"
            ),
        ],
    );

    let firefox = firefox_profile(users_root);
    create_db(
        &firefox.join("places.sqlite"),
        &[
            "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT, title TEXT, \
             visit_count INTEGER, last_visit_date INTEGER)",
            &format!(
                "INSERT INTO moz_places (url, title, visit_count, last_visit_date) \
                 VALUES ('https://mozilla.org', 'Mozilla', 1, {FIREFOX_VISIT})"
            ),
        ],
    );
    create_db(
        &firefox.join("cookies.sqlite"),
        &[
            "CREATE TABLE moz_cookies (host TEXT, name TEXT, value TEXT, lastAccessed INTEGER)",
            &format!("INSERT INTO moz_cookies VALUES ('mozilla.org', 'pref', 'dark', {FIREFOX_VISIT})"),
        ],
    );
}

pub fn discover(users_root: &Path, log: Arc<AcquisitionLog>) -> DiscoveredProfiles {
    ProfileDiscovery::new(Platform::Linux, Some(users_root.to_path_buf()), log).discover()
}

pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}
