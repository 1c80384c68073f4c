//! Summary diagnostics over an unordered stream of check records.
//!
//! Every update is a min, sum or count, so the result does not depend on the
//! order in which records arrive, and two partial aggregators can be merged.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::check::CheckRecord;
use crate::range::{Quadruple, RangeSet};
use crate::worker::{Delivery, WorkerMessage};

/// One histogram bucket: a normalized error string and its frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBucket {
    pub error: String,
    pub count: u64,
}

/// Run facts the aggregator cannot see from records alone.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub ranges: RangeSet,
    pub target: i64,
    pub cores: usize,
    pub workers: usize,
    pub delivery: Delivery,
    pub elapsed: Duration,
}

/// Final diagnostics for one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub ranges: RangeSet,
    pub target: i64,
    pub cores: usize,
    pub workers: usize,
    pub delivery: Delivery,
    pub elapsed: Duration,
    pub total_checks: u64,
    /// Exact solutions, in enumeration order.
    pub solutions: Vec<Quadruple>,
    pub overflow_count: u64,
    pub failed_count: u64,
    pub min_abs_error: Option<BigInt>,
    /// `None` when any record overflowed or the mean is not a finite f64.
    pub mean_abs_error: Option<f64>,
    /// Most frequent buckets, by count descending then bucket ascending.
    pub top_errors: Vec<ErrorBucket>,
    /// Record with the smallest |error|; ties go to the earliest tuple.
    pub best: Option<CheckRecord>,
}

impl Diagnostics {
    pub fn solution_count(&self) -> usize {
        self.solutions.len()
    }

    pub fn most_frequent(&self) -> Option<&ErrorBucket> {
        self.top_errors.first()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Ranges:          {}", self.ranges)?;
        writeln!(
            f,
            "  Elapsed:         {:.3}s on {} workers ({} cores)",
            self.elapsed.as_secs_f64(),
            self.workers,
            self.cores
        )?;
        writeln!(f, "  Tuples checked:  {}", self.total_checks)?;
        match (&self.min_abs_error, &self.best) {
            (Some(min), Some(best)) => writeln!(f, "  Minimum |error|: {} at {}", min, best.quad)?,
            _ => writeln!(f, "  Minimum |error|: unavailable")?,
        }
        match self.mean_abs_error {
            Some(mean) => writeln!(f, "  Mean |error|:    {:.6e}", mean)?,
            None => writeln!(f, "  Mean |error|:    unavailable")?,
        }
        writeln!(f, "  Solutions:       {}", self.solution_count())?;
        for q in &self.solutions {
            writeln!(f, "    {}", q)?;
        }
        if self.overflow_count > 0 || self.failed_count > 0 {
            writeln!(
                f,
                "  Overflowed:      {}   Failed: {}",
                self.overflow_count, self.failed_count
            )?;
        }
        match self.most_frequent() {
            Some(b) => write!(f, "  Most frequent:   {} ({}×)", b.error, b.count),
            None => write!(f, "  Most frequent:   none"),
        }
    }
}

/// Streaming accumulator for `Diagnostics`.
#[derive(Debug, Clone)]
pub struct Aggregator {
    top_n: usize,
    total: u64,
    overflow: u64,
    failed: u64,
    exact: u64,
    abs_sum: BigInt,
    solutions: Vec<Quadruple>,
    best: Option<(BigInt, CheckRecord)>,
    histogram: HashMap<String, u64>,
}

impl Aggregator {
    pub fn new(top_n: usize) -> Self {
        Aggregator {
            top_n,
            total: 0,
            overflow: 0,
            failed: 0,
            exact: 0,
            abs_sum: BigInt::zero(),
            solutions: Vec::new(),
            best: None,
            histogram: HashMap::new(),
        }
    }

    pub fn observe(&mut self, msg: &WorkerMessage) {
        match msg {
            WorkerMessage::Record(record) => self.observe_record(record),
            WorkerMessage::Failed { .. } => self.failed += 1,
        }
    }

    pub fn observe_record(&mut self, record: &CheckRecord) {
        self.total += 1;
        *self
            .histogram
            .entry(record.normalized_error.clone())
            .or_insert(0) += 1;

        let Some(abs) = record.abs_error() else {
            self.overflow += 1;
            return;
        };

        self.exact += 1;
        self.abs_sum += &abs;
        if abs.is_zero() {
            self.solutions.push(record.quad);
        }
        if is_better(&abs, &record.quad, self.best.as_ref()) {
            self.best = Some((abs, record.clone()));
        }
    }

    /// Fold another partial aggregate into this one.
    pub fn merge(&mut self, other: Aggregator) {
        self.total += other.total;
        self.overflow += other.overflow;
        self.failed += other.failed;
        self.exact += other.exact;
        self.abs_sum += other.abs_sum;
        self.solutions.extend(other.solutions);
        for (bucket, count) in other.histogram {
            *self.histogram.entry(bucket).or_insert(0) += count;
        }
        if let Some((abs, record)) = other.best {
            if is_better(&abs, &record.quad, self.best.as_ref()) {
                self.best = Some((abs, record));
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn finish(self, ctx: RunContext) -> Diagnostics {
        let mut solutions = self.solutions;
        solutions.sort();

        let mean_abs_error = if self.overflow > 0 {
            None
        } else {
            exact_mean(&self.abs_sum, self.exact)
        };

        let mut buckets: Vec<ErrorBucket> = self
            .histogram
            .into_iter()
            .map(|(error, count)| ErrorBucket { error, count })
            .collect();
        buckets.sort_by(|x, y| y.count.cmp(&x.count).then_with(|| x.error.cmp(&y.error)));
        buckets.truncate(self.top_n);

        let (min_abs_error, best) = match self.best {
            Some((abs, record)) => (Some(abs), Some(record)),
            None => (None, None),
        };

        Diagnostics {
            ranges: ctx.ranges,
            target: ctx.target,
            cores: ctx.cores,
            workers: ctx.workers,
            delivery: ctx.delivery,
            elapsed: ctx.elapsed,
            total_checks: self.total,
            solutions,
            overflow_count: self.overflow,
            failed_count: self.failed,
            min_abs_error,
            mean_abs_error,
            top_errors: buckets,
            best,
        }
    }
}

fn is_better(abs: &BigInt, quad: &Quadruple, current: Option<&(BigInt, CheckRecord)>) -> bool {
    match current {
        None => true,
        Some((best_abs, best)) => (abs, quad) < (best_abs, &best.quad),
    }
}

/// `sum / count` as f64, keeping the integer part exact before conversion.
fn exact_mean(sum: &BigInt, count: u64) -> Option<f64> {
    if count == 0 {
        return None;
    }
    let (quot, rem) = sum.div_rem(&BigInt::from(count));
    let whole = quot.to_f64()?;
    let frac = rem.to_f64()? / count as f64;
    let mean = whole + frac;
    mean.is_finite().then_some(mean)
}
