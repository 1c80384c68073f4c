//! Run configuration shared by single sweeps and the interval loop.

use std::path::PathBuf;

use crate::check::TARGET;
use crate::document::DocumentOptions;
use crate::range::RangeSet;
use crate::worker::Delivery;

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Right-hand side of a^b − c^d = target.
    pub target: i64,
    /// Worker count; defaults to the number of available cores.
    pub workers: usize,
    /// Bound of the streaming channel between workers and aggregator.
    pub channel_capacity: usize,
    /// Powers whose estimated bit length exceeds this become `overflow`.
    pub magnitude_ceiling_bits: u64,
    /// Histogram buckets reported in diagnostics.
    pub top_n: usize,
    pub delivery: Delivery,
    pub output_dir: PathBuf,
    pub document: DocumentOptions,
    /// Keep the local document after a successful push.
    pub keep_local: bool,
    /// Write the local document but skip publishing.
    pub dry_run: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            target: TARGET,
            workers: available_cores(),
            channel_capacity: 1024,
            magnitude_ceiling_bits: 1 << 20,
            top_n: 10,
            delivery: Delivery::Streaming,
            output_dir: PathBuf::from("results"),
            document: DocumentOptions::default(),
            keep_local: false,
            dry_run: false,
        }
    }
}

impl SweepConfig {
    pub fn commit_message(&self, ranges: &RangeSet) -> String {
        format!(
            "Add a^b - c^d = {} sweep results for {}",
            self.target, ranges
        )
    }
}

/// Number of cores the scheduler will give us, at least 1.
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
