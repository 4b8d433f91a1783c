use std::path::PathBuf;

use clap::Parser;

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "frostveil",
    author,
    version,
    about = "Forensic extraction of browser artefacts (Chrome, Edge, Firefox, Safari)"
)]
pub struct CliOptions {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Output file name; grouped outputs get `_<group>` inserted before the suffix
    #[arg(long, default_value = "artifacts_export.csv")]
    pub out: PathBuf,

    /// Directory for every file the run writes (outputs, log, manifest, timeline, report)
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Separate outputs per browser
    #[arg(long)]
    pub per_browser: bool,

    /// Separate outputs per artefact kind
    #[arg(long)]
    pub split_artifacts: bool,

    /// zstd-compress text outputs (appends `.zst`)
    #[arg(long)]
    pub compress: bool,

    /// Export a unified timeline JSON
    #[arg(long)]
    pub timeline: bool,

    /// Generate a Markdown report
    #[arg(long)]
    pub report: bool,

    /// Optional path to config file (YAML)
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Number of worker threads (overrides config when set)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Directory holding the user home directories (overrides config and the OS default)
    #[arg(long)]
    pub users_root: Option<PathBuf>,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
