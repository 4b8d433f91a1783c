//! # Profile Discovery
//!
//! Locates browser profiles for every user home on the host. The on-disk
//! layouts are fixed by the browsers themselves; only the users root can be
//! overridden (for example when acquiring from a mounted image).

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::logging::AcquisitionLog;
use crate::parsers::browser::{BrowserKind, BrowserProfile};

/// Primary history database inside a Chromium profile directory.
pub const CHROMIUM_HISTORY_FILE: &str = "History";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn users_root(&self) -> PathBuf {
        match self {
            Platform::Windows => PathBuf::from("C:/Users"),
            Platform::MacOs => PathBuf::from("/Users"),
            Platform::Linux => PathBuf::from("/home"),
        }
    }

    /// Chromium "User Data" roots relative to a home directory.
    fn chromium_roots(&self) -> [(BrowserKind, &'static str); 2] {
        match self {
            Platform::Windows => [
                (BrowserKind::Chrome, "AppData/Local/Google/Chrome/User Data"),
                (BrowserKind::Edge, "AppData/Local/Microsoft/Edge/User Data"),
            ],
            Platform::MacOs => [
                (BrowserKind::Chrome, "Library/Application Support/Google/Chrome"),
                (BrowserKind::Edge, "Library/Application Support/Microsoft Edge"),
            ],
            Platform::Linux => [
                (BrowserKind::Chrome, ".config/google-chrome"),
                (BrowserKind::Edge, ".config/microsoft-edge"),
            ],
        }
    }

    fn firefox_root(&self) -> &'static str {
        match self {
            Platform::Windows => "AppData/Roaming/Mozilla/Firefox/Profiles",
            Platform::MacOs => "Library/Application Support/Firefox/Profiles",
            Platform::Linux => ".mozilla/firefox",
        }
    }

    fn safari_history(&self) -> Option<&'static str> {
        match self {
            Platform::MacOs => Some("Library/Safari/History.db"),
            _ => None,
        }
    }
}

pub type DiscoveredProfiles = BTreeMap<BrowserKind, Vec<BrowserProfile>>;

pub struct ProfileDiscovery {
    platform: Platform,
    users_root: PathBuf,
    log: Arc<AcquisitionLog>,
}

impl ProfileDiscovery {
    pub fn new(platform: Platform, users_root: Option<PathBuf>, log: Arc<AcquisitionLog>) -> Self {
        let users_root = users_root.unwrap_or_else(|| platform.users_root());
        Self {
            platform,
            users_root,
            log,
        }
    }

    pub fn for_current_host(users_root: Option<PathBuf>, log: Arc<AcquisitionLog>) -> Self {
        Self::new(Platform::current(), users_root, log)
    }

    /// Candidate home directories: every directory under the users root, or
    /// the current user's home when the root is absent.
    pub fn user_homes(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.users_root) {
            Ok(entries) => {
                let mut homes: Vec<PathBuf> = entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.is_dir())
                    .collect();
                homes.sort();
                homes
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                self.log.error(format!(
                    "[ACCESS DENIED] Cannot list user homes under {}",
                    self.users_root.display()
                ));
                current_home().into_iter().collect()
            }
            Err(_) => current_home().into_iter().collect(),
        }
    }

    pub fn discover(&self) -> DiscoveredProfiles {
        let mut found = DiscoveredProfiles::new();
        for home in self.user_homes() {
            self.discover_home(&home, &mut found);
        }
        for (browser, profiles) in &found {
            debug!("discovered {} {browser} profile(s)", profiles.len());
        }
        found
    }

    fn discover_home(&self, home: &Path, found: &mut DiscoveredProfiles) {
        match std::fs::read_dir(home) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                self.log.error(format!(
                    "[ACCESS DENIED] Skipping entire home directory {}",
                    home.display()
                ));
                return;
            }
            Err(err) => {
                self.log.error(format!(
                    "[ERROR] Unexpected error scanning {}: {err}",
                    home.display()
                ));
                return;
            }
        }

        for (browser, relative) in self.platform.chromium_roots() {
            let root = home.join(relative);
            for history in self.chromium_profiles(home, browser, &root) {
                found
                    .entry(browser)
                    .or_default()
                    .push(BrowserProfile::new(browser, history));
            }
        }

        if let Some(relative) = self.platform.safari_history() {
            self.add_if_present(home, BrowserKind::Safari, home.join(relative), found);
        }
        let firefox_root = home.join(self.platform.firefox_root());
        if self.present(home, &firefox_root)
            && self.list_root(home, BrowserKind::Firefox, &firefox_root).is_some()
        {
            found
                .entry(BrowserKind::Firefox)
                .or_default()
                .push(BrowserProfile::new(BrowserKind::Firefox, firefox_root));
        }
    }

    /// History files of every profile directory under a Chromium root.
    fn chromium_profiles(&self, home: &Path, browser: BrowserKind, root: &Path) -> Vec<PathBuf> {
        if !self.present(home, root) {
            return Vec::new();
        }
        let Some(entries) = self.list_root(home, browser, root) else {
            return Vec::new();
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        dirs.into_iter()
            .map(|dir| dir.join(CHROMIUM_HISTORY_FILE))
            .filter(|history| self.present(home, history))
            .collect()
    }

    /// List a browser's profiles root, logging a denial once for the root.
    fn list_root(&self, home: &Path, browser: BrowserKind, root: &Path) -> Option<std::fs::ReadDir> {
        match std::fs::read_dir(root) {
            Ok(entries) => Some(entries),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                self.log.error(format!(
                    "[ACCESS DENIED] Cannot list {browser} profiles at {} (user={})",
                    root.display(),
                    home_name(home)
                ));
                None
            }
            Err(err) => {
                self.log.error(format!(
                    "[ERROR] Failed to list {browser} profiles at {}: {err}",
                    root.display()
                ));
                None
            }
        }
    }

    fn add_if_present(
        &self,
        home: &Path,
        browser: BrowserKind,
        path: PathBuf,
        found: &mut DiscoveredProfiles,
    ) {
        if self.present(home, &path) {
            found
                .entry(browser)
                .or_default()
                .push(BrowserProfile::new(browser, path));
        }
    }

    /// Existence check that reports denials instead of treating them as absent.
    fn present(&self, home: &Path, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(_) => true,
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                self.log.error(format!(
                    "[ACCESS DENIED] Could not access {} (user={})",
                    path.display(),
                    home_name(home)
                ));
                false
            }
            Err(err) => {
                self.log.error(format!(
                    "[ERROR] Failed to check {}: {err}",
                    path.display()
                ));
                false
            }
        }
    }
}

fn home_name(home: &Path) -> String {
    home.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| home.display().to_string())
}

fn current_home() -> Option<PathBuf> {
    ["HOME", "USERPROFILE"]
        .iter()
        .find_map(|var| std::env::var_os(var))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, b"").expect("write");
    }

    #[test]
    fn discovers_linux_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let alice = dir.path().join("alice");
        touch(&alice.join(".config/google-chrome/Default/History"));
        touch(&alice.join(".config/google-chrome/Profile 1/History"));
        std::fs::create_dir_all(alice.join(".config/google-chrome/Crashpad")).expect("mkdir");
        touch(&alice.join(".config/microsoft-edge/Default/History"));
        std::fs::create_dir_all(alice.join(".mozilla/firefox/abcd.default-release")).expect("mkdir");

        let log = Arc::new(AcquisitionLog::in_memory());
        let discovery = ProfileDiscovery::new(Platform::Linux, Some(dir.path().to_path_buf()), log.clone());
        let found = discovery.discover();

        let chrome = &found[&BrowserKind::Chrome];
        assert_eq!(chrome.len(), 2);
        assert!(chrome[0].path.ends_with("Default/History"));
        assert!(chrome[1].path.ends_with("Profile 1/History"));
        assert_eq!(found[&BrowserKind::Edge].len(), 1);
        assert_eq!(
            found[&BrowserKind::Firefox],
            vec![BrowserProfile::new(BrowserKind::Firefox, alice.join(".mozilla/firefox"))]
        );
        assert!(!found.contains_key(&BrowserKind::Safari));
        assert_eq!(log.error_count(), 0);
    }

    #[test]
    fn discovers_macos_safari_and_windows_layouts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bob = dir.path().join("bob");
        touch(&bob.join("Library/Safari/History.db"));
        touch(&bob.join("Library/Application Support/Google/Chrome/Default/History"));

        let log = Arc::new(AcquisitionLog::in_memory());
        let mac = ProfileDiscovery::new(Platform::MacOs, Some(dir.path().to_path_buf()), log.clone());
        let found = mac.discover();
        assert_eq!(found[&BrowserKind::Safari].len(), 1);
        assert_eq!(found[&BrowserKind::Chrome].len(), 1);

        let carol = dir.path().join("carol");
        touch(&carol.join("AppData/Local/Microsoft/Edge/User Data/Default/History"));
        std::fs::create_dir_all(carol.join("AppData/Roaming/Mozilla/Firefox/Profiles")).expect("mkdir");
        let win = ProfileDiscovery::new(Platform::Windows, Some(dir.path().to_path_buf()), log);
        let found = win.discover();
        assert_eq!(found[&BrowserKind::Edge].len(), 1);
        assert_eq!(found[&BrowserKind::Firefox].len(), 1);
        assert!(!found.contains_key(&BrowserKind::Safari));
    }

    #[test]
    fn duplicates_across_homes_are_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        for user in ["u1", "u2"] {
            touch(&dir.path().join(user).join(".config/google-chrome/Default/History"));
        }
        let discovery = ProfileDiscovery::new(
            Platform::Linux,
            Some(dir.path().to_path_buf()),
            Arc::new(AcquisitionLog::in_memory()),
        );
        assert_eq!(discovery.discover()[&BrowserKind::Chrome].len(), 2);
    }

    #[test]
    fn rediscovery_is_identical() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("a/.config/google-chrome/Default/History"));
        touch(&dir.path().join("b/.config/microsoft-edge/Profile 2/History"));
        std::fs::create_dir_all(dir.path().join("b/.mozilla/firefox")).expect("mkdir");
        let discovery = ProfileDiscovery::new(
            Platform::Linux,
            Some(dir.path().to_path_buf()),
            Arc::new(AcquisitionLog::in_memory()),
        );
        assert_eq!(discovery.discover(), discovery.discover());
    }

    #[cfg(unix)]
    #[test]
    fn denied_chrome_root_is_logged_once() {
        use std::os::unix::fs::PermissionsExt;
        if unsafe { libc::geteuid() } == 0 {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let home = dir.path().join("dana");
        touch(&home.join(".config/google-chrome/Default/History"));
        touch(&home.join(".config/microsoft-edge/Default/History"));
        std::fs::create_dir_all(home.join(".mozilla/firefox")).expect("mkdir");
        let chrome_root = home.join(".config/google-chrome");
        std::fs::set_permissions(&chrome_root, std::fs::Permissions::from_mode(0o000)).expect("chmod");

        let log = Arc::new(AcquisitionLog::in_memory());
        let discovery = ProfileDiscovery::new(Platform::Linux, Some(dir.path().to_path_buf()), log.clone());
        let found = discovery.discover();
        std::fs::set_permissions(&chrome_root, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let errors = log.take_errors();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("ACCESS DENIED"));
        assert!(errors[0].contains("google-chrome"));
        assert!(!found.contains_key(&BrowserKind::Chrome));
        assert_eq!(found[&BrowserKind::Edge].len(), 1);
        assert_eq!(found[&BrowserKind::Firefox].len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn denied_firefox_root_is_logged_once() {
        use std::os::unix::fs::PermissionsExt;
        if unsafe { libc::geteuid() } == 0 {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let home = dir.path().join("erin");
        touch(&home.join(".config/google-chrome/Default/History"));
        std::fs::create_dir_all(home.join(".mozilla/firefox/a1.default")).expect("mkdir");
        let firefox_root = home.join(".mozilla/firefox");
        std::fs::set_permissions(&firefox_root, std::fs::Permissions::from_mode(0o000)).expect("chmod");

        let log = Arc::new(AcquisitionLog::in_memory());
        let discovery = ProfileDiscovery::new(Platform::Linux, Some(dir.path().to_path_buf()), log.clone());
        let found = discovery.discover();
        std::fs::set_permissions(&firefox_root, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let errors = log.take_errors();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("ACCESS DENIED"));
        assert!(errors[0].contains(".mozilla/firefox"));
        assert!(errors[0].contains("user=erin"));
        assert!(!found.contains_key(&BrowserKind::Firefox));
        assert_eq!(found[&BrowserKind::Chrome].len(), 1);
    }
}
