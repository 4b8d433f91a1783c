//! # Logging
//!
//! Two sinks: process diagnostics go through `tracing`, and every acquisition
//! event (access denials, parse failures, progress notes) is appended to the
//! run's acquisition log with a UTC timestamp prefix. The acquisition log is an
//! explicit handle, opened at run start and shared by `Arc` with the discovery,
//! snapshot and extraction stages.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. Safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

enum LogSink {
    File(BufWriter<File>),
    Memory(Vec<String>),
}

struct LogState {
    sink: LogSink,
    errors: Vec<String>,
}

/// Append-only acquisition log.
pub struct AcquisitionLog {
    state: Mutex<LogState>,
}

impl AcquisitionLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::with_sink(LogSink::File(BufWriter::new(file))))
    }

    /// A log kept in memory, for tests and dry runs.
    pub fn in_memory() -> Self {
        Self::with_sink(LogSink::Memory(Vec::new()))
    }

    fn with_sink(sink: LogSink) -> Self {
        Self {
            state: Mutex::new(LogState {
                sink,
                errors: Vec::new(),
            }),
        }
    }

    /// Record an informational event.
    pub fn note(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{message}");
        let mut state = self.lock();
        write_line(&mut state.sink, message);
    }

    /// Record a non-fatal failure. It is also kept for the run's error list.
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        let mut state = self.lock();
        write_line(&mut state.sink, &message);
        state.errors.push(message);
    }

    /// Errors logged since the last call, in logging order.
    pub fn take_errors(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().errors)
    }

    pub fn error_count(&self) -> usize {
        self.lock().errors.len()
    }

    /// Lines written so far when backed by memory; empty for file sinks.
    pub fn lines(&self) -> Vec<String> {
        match &self.lock().sink {
            LogSink::Memory(lines) => lines.clone(),
            LogSink::File(_) => Vec::new(),
        }
    }

    pub fn flush(&self) -> std::io::Result<()> {
        match &mut self.lock().sink {
            LogSink::File(writer) => writer.flush(),
            LogSink::Memory(_) => Ok(()),
        }
    }

    /// Flush and release the log at run end.
    pub fn close(self) -> std::io::Result<()> {
        self.flush()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        // A panic while holding the lock leaves the log usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn write_line(sink: &mut LogSink, message: &str) {
    let line = format!(
        "[{}] {}",
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ"),
        message
    );
    match sink {
        LogSink::File(writer) => {
            if let Err(err) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
                warn!("acquisition log write failed: {err}");
            }
        }
        LogSink::Memory(lines) => lines.push(line),
    }
}
