use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use frostveil::aggregate::Aggregator;
use frostveil::discovery::ProfileDiscovery;
use frostveil::host::HostMetadata;
use frostveil::logging::{self, AcquisitionLog};
use frostveil::manifest::{self, Manifest};
use frostveil::output::{self, OutputOptions};
use frostveil::parsers::{self, ExtractionContext};
use frostveil::snapshot::SnapshotAcquirer;
use frostveil::{cli, config, report};

fn main() -> Result<()> {
    logging::init_logging();

    let cli_opts = cli::parse();
    let loaded = config::load_config(cli_opts.config_path.as_deref())?;
    let mut cfg = loaded.config;
    if let Some(workers) = cli_opts.workers {
        cfg.workers = workers.max(1);
    }
    if cli_opts.users_root.is_some() {
        cfg.users_root = cli_opts.users_root.clone();
    }

    let output_dir = cli_opts.output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("create output dir {}", output_dir.display()))?;
    let under_output = |p: &Path| -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            output_dir.join(p)
        }
    };

    let host = HostMetadata::collect();
    let log_path = under_output(&cfg.log_file);
    let log = Arc::new(
        AcquisitionLog::open(&log_path)
            .with_context(|| format!("open acquisition log {}", log_path.display()))?,
    );
    log.note(format!(
        "=== Acquisition started run_id={} hostname={} username={} os={} acquired_utc={} config_hash={} ===",
        cfg.run_id,
        host.hostname,
        host.username,
        host.os,
        host.acquired_utc_string(),
        loaded.config_hash
    ));
    info!(
        "starting run_id={} output_dir={} workers={}",
        cfg.run_id,
        output_dir.display(),
        cfg.workers
    );

    let discovery = ProfileDiscovery::for_current_host(cfg.users_root.clone(), log.clone());
    let profiles = discovery.discover();
    drop(discovery);

    let snapshots = SnapshotAcquirer::new(cfg.temp_dir.clone(), log.clone());
    let result = {
        let ctx = ExtractionContext {
            host: &host,
            snapshots: &snapshots,
            log: &log,
        };
        Aggregator::new(parsers::default_extractors())
            .with_workers(cfg.workers)
            .run(&profiles, &ctx)
    };
    drop(snapshots);

    let mut outputs = output::write_outputs(
        &result.records,
        &OutputOptions {
            format: cli_opts.format,
            out: under_output(&cli_opts.out),
            per_browser: cli_opts.per_browser,
            split_artifacts: cli_opts.split_artifacts,
            compress: cli_opts.compress,
        },
    )?;

    if cli_opts.timeline {
        let timeline_path = under_output(&cfg.timeline_file);
        let n = output::timeline::write_timeline(&timeline_path, &result.records)?;
        info!("timeline with {n} entries written to {}", timeline_path.display());
        outputs.push(timeline_path);
    }

    let manifest = Manifest::build(&cfg.run_id, &host, &outputs, &result.records, &result.errors);
    let manifest_path = under_output(&cfg.manifest_file);
    manifest.write(&manifest_path)?;
    match manifest::sign_manifest(&manifest_path) {
        Ok(sig) => log.note(format!("Manifest signed with SHA256 ({})", sig.display())),
        Err(err) => {
            warn!("manifest signing failed: {err:#}");
            log.note(format!("Failed to sign manifest: {err:#}"));
        }
    }

    if cli_opts.report {
        let report_path = under_output(&cfg.report_file);
        report::write_report(&report_path, &manifest)?;
        info!("report written to {}", report_path.display());
    }

    log.note(format!(
        "=== Acquisition finished records={} errors={} ===",
        result.records.len(),
        result.errors.len()
    ));
    match Arc::try_unwrap(log) {
        Ok(log) => log.close()?,
        Err(shared) => shared.flush()?,
    }

    print_summary(&manifest, &profiles, &outputs);
    Ok(())
}

fn print_summary(
    manifest: &Manifest,
    profiles: &frostveil::discovery::DiscoveredProfiles,
    outputs: &[PathBuf],
) {
    let meta = &manifest.metadata;
    println!("\n=== Frostveil Extraction Summary ===");
    println!("Host: {} User: {} OS: {}", meta.hostname, meta.username, meta.os);
    println!("Acquired at: {}", meta.acquired_utc_string());
    let browsers: Vec<&str> = profiles.keys().map(|b| b.as_str()).collect();
    println!("Browsers scanned: {}", browsers.join(", "));
    let counts: Vec<String> = manifest
        .counts
        .iter()
        .map(|(kind, n)| format!("{kind}: {n}"))
        .collect();
    println!("Artifacts collected: {{ {} }}", counts.join(", "));
    let files: Vec<String> = outputs.iter().map(|p| p.display().to_string()).collect();
    println!("Output files: [{}]", files.join(", "));
    if !manifest.errors.is_empty() {
        println!("\n[!] Errors/Access Denied:");
        for err in &manifest.errors {
            println!("   - {err}");
        }
        println!("\n[!] Total errors/access denied: {}", manifest.errors.len());
    }
}
