//! # Aggregation
//!
//! Runs every extractor against every discovered profile and merges the
//! results. With more than one worker, profiles are fanned out over a
//! crossbeam channel; records are re-sequenced by profile index so the merged
//! output has the same order as a sequential run.

use std::thread;

use crossbeam_channel::{bounded, unbounded};
use tracing::{debug, info};

use crate::discovery::DiscoveredProfiles;
use crate::parsers::browser::{ArtifactRecord, BrowserProfile};
use crate::parsers::{ArtifactExtractor, ExtractionContext};

/// Records and errors collected over a whole run.
#[derive(Debug, Default)]
pub struct RunResult {
    pub records: Vec<ArtifactRecord>,
    pub errors: Vec<String>,
}

pub struct Aggregator {
    extractors: Vec<Box<dyn ArtifactExtractor>>,
    workers: usize,
}

impl Aggregator {
    pub fn new(extractors: Vec<Box<dyn ArtifactExtractor>>) -> Self {
        Self {
            extractors,
            workers: 1,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn run(&self, profiles: &DiscoveredProfiles, ctx: &ExtractionContext<'_>) -> RunResult {
        let ordered: Vec<&BrowserProfile> = profiles.values().flatten().collect();
        let records = if self.workers <= 1 || ordered.len() <= 1 {
            ordered
                .iter()
                .flat_map(|profile| self.extract_profile(profile, ctx))
                .collect()
        } else {
            self.run_parallel(&ordered, ctx)
        };

        let result = RunResult {
            records,
            errors: ctx.log.take_errors(),
        };
        info!(
            "aggregated {} record(s) from {} profile(s) with {} error(s)",
            result.records.len(),
            ordered.len(),
            result.errors.len()
        );
        result
    }

    /// Each extractor runs exactly once for the profile.
    fn extract_profile(&self, profile: &BrowserProfile, ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord> {
        ctx.log.note(format!(
            "Processing {} {}",
            profile.browser,
            profile.path.display()
        ));
        let mut out = Vec::new();
        for extractor in &self.extractors {
            let records = extractor.extract(profile, ctx);
            debug!(
                "{} {} -> {} {} record(s)",
                profile.browser,
                profile.path.display(),
                records.len(),
                extractor.kind()
            );
            out.extend(records);
        }
        out
    }

    fn run_parallel(&self, ordered: &[&BrowserProfile], ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord> {
        let worker_count = self.workers.min(ordered.len());
        let (job_tx, job_rx) = bounded::<(usize, &BrowserProfile)>(ordered.len());
        let (result_tx, result_rx) = unbounded::<(usize, Vec<ArtifactRecord>)>();

        for (idx, profile) in ordered.iter().enumerate() {
            // Capacity equals the job count, so this never blocks.
            let _ = job_tx.send((idx, *profile));
        }
        drop(job_tx);

        thread::scope(|scope| {
            for _ in 0..worker_count {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (idx, profile) in job_rx {
                        let records = self.extract_profile(profile, ctx);
                        if result_tx.send((idx, records)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<Vec<ArtifactRecord>>> = (0..ordered.len()).map(|_| None).collect();
        for (idx, records) in result_rx {
            slots[idx] = Some(records);
        }
        slots.into_iter().flatten().flatten().collect()
    }
}
