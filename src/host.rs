use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity of the acquiring host, captured once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostMetadata {
    pub hostname: String,
    pub username: String,
    pub os: String,
    #[serde(serialize_with = "serialize_utc")]
    pub acquired_utc: DateTime<Utc>,
}

impl HostMetadata {
    pub fn collect() -> Self {
        Self {
            hostname: local_hostname(),
            username: current_username(),
            os: os_descriptor(),
            acquired_utc: Utc::now(),
        }
    }

    pub fn acquired_utc_string(&self) -> String {
        crate::time::format_utc(&self.acquired_utc)
    }
}

fn serialize_utc<S: serde::Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&crate::time::format_utc(ts))
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn current_username() -> String {
    for var in ["LOGNAME", "USER", "LNAME", "USERNAME"] {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                return value;
            }
        }
    }
    #[cfg(unix)]
    {
        if let Some(name) = passwd_username() {
            return name;
        }
    }
    "unknown".to_string()
}

#[cfg(unix)]
fn passwd_username() -> Option<String> {
    // getpwuid returns a pointer into static storage; copy out before returning.
    unsafe {
        let pw = libc::getpwuid(libc::geteuid());
        if pw.is_null() || (*pw).pw_name.is_null() {
            return None;
        }
        let name = std::ffi::CStr::from_ptr((*pw).pw_name);
        Some(name.to_string_lossy().to_string())
    }
}

fn os_descriptor() -> String {
    format!(
        "{}-{}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        std::env::consts::FAMILY
    )
}
