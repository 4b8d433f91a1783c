//! # Record Outputs
//!
//! Writes aggregated records to disk in one of four formats, optionally
//! grouped per browser and/or per artefact kind, and optionally zstd
//! compressed. Every writer goes through [`ArtifactRecord::to_row`], so all
//! formats share one column layout.

pub mod csv;
pub mod json;
pub mod sqlite;
pub mod timeline;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use thiserror::Error;
use tracing::{info, warn};

use crate::parsers::browser::ArtifactRecord;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
    Jsonl,
    Sqlite,
}

/// Formats streamed through a [`TextSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextFormat {
    Csv,
    Json,
    Jsonl,
}

impl OutputFormat {
    pub fn is_text(&self) -> bool {
        self.text_format().is_some()
    }

    fn text_format(&self) -> Option<TextFormat> {
        match self {
            OutputFormat::Csv => Some(TextFormat::Csv),
            OutputFormat::Json => Some(TextFormat::Json),
            OutputFormat::Jsonl => Some(TextFormat::Jsonl),
            OutputFormat::Sqlite => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub out: PathBuf,
    pub per_browser: bool,
    pub split_artifacts: bool,
    pub compress: bool,
}

/// Records sharing one output file. `name` is empty for the ungrouped file.
#[derive(Debug)]
pub struct RecordGroup<'a> {
    pub name: String,
    pub records: Vec<&'a ArtifactRecord>,
}

/// Groups keep the order in which their first record was seen.
pub fn group_records<'a>(
    records: &'a [ArtifactRecord],
    per_browser: bool,
    split_artifacts: bool,
) -> Vec<RecordGroup<'a>> {
    if !per_browser && !split_artifacts {
        return vec![RecordGroup {
            name: String::new(),
            records: records.iter().collect(),
        }];
    }

    let mut groups: Vec<RecordGroup<'a>> = Vec::new();
    for record in records {
        let mut key = Vec::with_capacity(2);
        if per_browser {
            key.push(record.browser().as_str());
        }
        if split_artifacts {
            key.push(record.artifact().as_str());
        }
        let name = key.join("_");
        match groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.records.push(record),
            None => groups.push(RecordGroup {
                name,
                records: vec![record],
            }),
        }
    }
    groups
}

/// `<dir>/<stem>_<group><suffix>`, or `out` itself for the ungrouped file.
pub fn group_path(out: &Path, group: &str) -> PathBuf {
    if group.is_empty() {
        return out.to_path_buf();
    }
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let suffix = out
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    out.with_file_name(format!("{stem}_{group}{suffix}"))
}

fn compressed_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".zst");
    PathBuf::from(name)
}

/// Write every group and return the paths written, in group order. No
/// records means no files.
pub fn write_outputs(
    records: &[ArtifactRecord],
    opts: &OutputOptions,
) -> Result<Vec<PathBuf>, OutputError> {
    if records.is_empty() {
        info!("no records extracted; no output files written");
        return Ok(Vec::new());
    }
    if opts.compress && !opts.format.is_text() {
        warn!("--compress ignored for sqlite output");
    }

    let mut written = Vec::new();
    for group in group_records(records, opts.per_browser, opts.split_artifacts) {
        let mut path = group_path(&opts.out, &group.name);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        match opts.format.text_format() {
            None => sqlite::write_sqlite(&path, &group.records)?,
            Some(text) => {
                if opts.compress {
                    path = compressed_path(&path);
                }
                let mut sink = TextSink::create(&path, opts.compress)?;
                match text {
                    TextFormat::Csv => csv::write_csv(&mut sink, &group.records)?,
                    TextFormat::Json => json::write_json(&mut sink, &group.records)?,
                    TextFormat::Jsonl => json::write_jsonl(&mut sink, &group.records)?,
                }
                sink.finish()?;
            }
        }
        info!("wrote {} record(s) to {}", group.records.len(), path.display());
        written.push(path);
    }
    Ok(written)
}

/// Destination of a text-format writer.
pub enum TextSink {
    Plain(BufWriter<File>),
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<File>>),
}

impl TextSink {
    pub fn create(path: &Path, compress: bool) -> std::io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        if compress {
            Ok(TextSink::Zstd(zstd::stream::write::Encoder::new(file, 0)?))
        } else {
            Ok(TextSink::Plain(file))
        }
    }

    /// Ends the zstd frame and flushes to disk. Dropping a sink without
    /// calling this leaves a truncated stream.
    pub fn finish(self) -> std::io::Result<()> {
        let mut inner = match self {
            TextSink::Plain(w) => w,
            TextSink::Zstd(enc) => enc.finish()?,
        };
        inner.flush()?;
        inner.get_ref().sync_all()
    }
}

impl Write for TextSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            TextSink::Plain(w) => w.write(buf),
            TextSink::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            TextSink::Plain(w) => w.flush(),
            TextSink::Zstd(w) => w.flush(),
        }
    }
}
