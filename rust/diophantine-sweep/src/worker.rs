//! Worker pool: evaluates slices in parallel and hands records to a single
//! consumer on the calling thread.
//!
//! Two delivery modes:
//! - `Streaming`: one scoped thread per slice sends each record through a
//!   bounded channel. Producers block when the consumer falls behind.
//! - `Batched`: a rayon pool maps every slice to a `Vec` of records, then the
//!   consumer drains them slice by slice.

use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::ScopedJoinHandle;

use crate::check::{CheckRecord, Evaluator};
use crate::partition::Slice;
use crate::range::{Quadruple, RangeSet};

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    #[error("worker thread for slice {0} panicked")]
    WorkerPanicked(usize),
}

/// How records travel from workers to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    #[default]
    Streaming,
    Batched,
}

/// What a worker emits for one tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    Record(CheckRecord),
    /// Evaluation panicked; the tuple is skipped and counted.
    Failed { quad: Quadruple, reason: String },
}

/// Slices plus the delivery settings for one sweep.
#[derive(Debug, Clone)]
pub struct WorkPlan {
    pub ranges: RangeSet,
    pub slices: Vec<Slice>,
    pub delivery: Delivery,
    /// Bound of the streaming channel.
    pub capacity: usize,
}

impl WorkPlan {
    pub fn workers(&self) -> usize {
        self.slices.len()
    }
}

/// Run `check` on one tuple, turning a panic into `WorkerMessage::Failed`.
pub fn check_isolated<C>(check: &C, quad: Quadruple) -> WorkerMessage
where
    C: Fn(Quadruple) -> CheckRecord + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| check(quad))) {
        Ok(record) => WorkerMessage::Record(record),
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            log::warn!("Evaluation of {} panicked: {}", quad, reason);
            WorkerMessage::Failed { quad, reason }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Evaluate every tuple of `plan` and pass each message to `consume`.
///
/// `consume` always runs on the calling thread. Returning an error from it
/// stops the sweep; streaming workers notice the closed channel and exit.
pub fn run<E, F>(plan: &WorkPlan, evaluator: &Evaluator, consume: F) -> Result<(), E>
where
    E: From<WorkerError>,
    F: FnMut(WorkerMessage) -> Result<(), E>,
{
    run_with(plan, &|quad: Quadruple| evaluator.check(quad), consume)
}

/// [`run`] with an arbitrary per-tuple check.
pub(crate) fn run_with<C, E, F>(plan: &WorkPlan, check: &C, consume: F) -> Result<(), E>
where
    C: Fn(Quadruple) -> CheckRecord + Sync,
    E: From<WorkerError>,
    F: FnMut(WorkerMessage) -> Result<(), E>,
{
    log::info!(
        "Evaluating {} tuples on {} workers ({:?})",
        plan.ranges.total(),
        plan.workers(),
        plan.delivery
    );
    match plan.delivery {
        Delivery::Streaming => run_streaming(plan, check, consume),
        Delivery::Batched => run_batched(plan, check, consume),
    }
}

fn run_streaming<C, E, F>(plan: &WorkPlan, check: &C, mut consume: F) -> Result<(), E>
where
    C: Fn(Quadruple) -> CheckRecord + Sync,
    E: From<WorkerError>,
    F: FnMut(WorkerMessage) -> Result<(), E>,
{
    let ranges = plan.ranges;
    std::thread::scope(|s| {
        let (tx, rx) = mpsc::sync_channel::<WorkerMessage>(plan.capacity.max(1));

        let handles: Vec<_> = plan
            .slices
            .iter()
            .map(|&slice| {
                let tx = tx.clone();
                let handle = s.spawn(move || {
                    log::debug!("Slice {} started: {} tuples", slice.id, slice.len());
                    for quad in slice.quadruples(ranges) {
                        if tx.send(check_isolated(check, quad)).is_err() {
                            log::debug!("Slice {} stopped: consumer hung up", slice.id);
                            return;
                        }
                    }
                    log::debug!("Slice {} finished", slice.id);
                });
                (slice.id, handle)
            })
            .collect();
        drop(tx);

        let mut consumed = Ok(());
        for msg in rx.iter() {
            if let Err(e) = consume(msg) {
                consumed = Err(e);
                break;
            }
        }
        drop(rx);

        // every handle is joined, so a panicked worker never escapes the scope
        let joined = join_workers(handles);
        consumed?;
        joined.map_err(E::from)
    })
}

/// Join all workers, reporting the first slice whose thread panicked.
fn join_workers(handles: Vec<(usize, ScopedJoinHandle<'_, ()>)>) -> Result<(), WorkerError> {
    let mut panicked = None;
    for (id, handle) in handles {
        if handle.join().is_err() {
            log::error!("Worker for slice {} panicked", id);
            panicked.get_or_insert(id);
        }
    }
    match panicked {
        Some(id) => Err(WorkerError::WorkerPanicked(id)),
        None => Ok(()),
    }
}

fn run_batched<C, E, F>(plan: &WorkPlan, check: &C, mut consume: F) -> Result<(), E>
where
    C: Fn(Quadruple) -> CheckRecord + Sync,
    E: From<WorkerError>,
    F: FnMut(WorkerMessage) -> Result<(), E>,
{
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(plan.workers().max(1))
        .build()
        .map_err(WorkerError::from)?;

    let ranges = plan.ranges;
    let batches: Vec<Vec<WorkerMessage>> = pool.install(|| {
        plan.slices
            .par_iter()
            .map(|slice| {
                slice
                    .quadruples(ranges)
                    .map(|quad| check_isolated(check, quad))
                    .collect()
            })
            .collect()
    });

    for batch in batches {
        for msg in batch {
            consume(msg)?;
        }
    }
    Ok(())
}
