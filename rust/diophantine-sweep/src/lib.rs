//! diophantine-sweep: parallel brute-force search for a^b − c^d = 6.
//!
//! A sweep enumerates every quadruple of four inclusive ranges, evaluates it
//! with exact big-integer arithmetic, streams the records into a JSON
//! document while aggregating diagnostics, then pushes the document to a
//! hosted repository.
//!
//! Pipeline: ranges → slices → worker pool → bounded channel →
//! aggregator + document writer → local file → publisher.

pub mod aggregate;
pub mod check;
pub mod config;
pub mod document;
pub mod github;
pub mod partition;
pub mod prompt;
pub mod publish;
pub mod range;
pub mod schedule;
pub mod worker;

use std::path::PathBuf;
use std::time::Instant;

use crate::aggregate::{Aggregator, Diagnostics, RunContext};
use crate::check::Evaluator;
use crate::config::{available_cores, SweepConfig};
use crate::document::{local_file_name, DocumentError, DocumentWriter};
use crate::partition::partition;
use crate::prompt::PromptError;
use crate::publish::{publish, PublishError, PublishOutcome, RemoteStore, RepoTarget};
use crate::range::{RangeError, RangeSet};
use crate::worker::{WorkPlan, WorkerError, WorkerMessage};

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("publishing failed: {source} (local copy kept at {})", local.display())]
    Publish {
        source: PublishError,
        local: PathBuf,
    },

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A finished sweep: diagnostics plus the local document holding all records.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub diagnostics: Diagnostics,
    pub document_path: PathBuf,
}

/// Run one sweep over `ranges` and write its document under
/// `config.output_dir`.
pub fn run_sweep(ranges: &RangeSet, config: &SweepConfig) -> Result<SweepOutcome, SweepError> {
    let start = Instant::now();
    let plan = WorkPlan {
        ranges: *ranges,
        slices: partition(ranges, config.workers),
        delivery: config.delivery,
        capacity: config.channel_capacity,
    };
    let evaluator = Evaluator::new(config.target, config.magnitude_ceiling_bits);

    let document_path = config.output_dir.join(local_file_name(ranges));
    let mut writer = DocumentWriter::create(&document_path, config.document)?;
    let mut aggregator = Aggregator::new(config.top_n);

    log::info!("Sweep over {} ({} tuples)", ranges, ranges.total());
    worker::run(&plan, &evaluator, |msg: WorkerMessage| {
        aggregator.observe(&msg);
        if let WorkerMessage::Record(record) = &msg {
            writer.write_record(record)?;
        }
        Ok::<(), SweepError>(())
    })?;

    let diagnostics = aggregator.finish(RunContext {
        ranges: *ranges,
        target: config.target,
        cores: available_cores(),
        workers: plan.workers(),
        delivery: config.delivery,
        elapsed: start.elapsed(),
    });
    writer.finish(&diagnostics)?;

    log::info!(
        "Sweep finished in {:.3}s: {} checks, {} solutions, document {}",
        diagnostics.elapsed.as_secs_f64(),
        diagnostics.total_checks,
        diagnostics.solution_count(),
        document_path.display()
    );
    Ok(SweepOutcome {
        diagnostics,
        document_path,
    })
}

/// Push the document of `outcome` to `target`.
///
/// The local file is removed after a successful push unless
/// `config.keep_local` is set, and always kept when the push fails.
pub fn publish_sweep(
    outcome: &SweepOutcome,
    store: &dyn RemoteStore,
    target: &RepoTarget,
    config: &SweepConfig,
) -> Result<PublishOutcome, SweepError> {
    let content = std::fs::read(&outcome.document_path)?;
    let message = config.commit_message(&outcome.diagnostics.ranges);

    match publish(store, target, &content, &message) {
        Ok(result) => {
            if !config.keep_local {
                std::fs::remove_file(&outcome.document_path)?;
                log::debug!("Removed local copy {}", outcome.document_path.display());
            }
            Ok(result)
        }
        Err(source) => {
            log::error!("Publishing {} failed: {}", target, source);
            Err(SweepError::Publish {
                source,
                local: outcome.document_path.clone(),
            })
        }
    }
}
