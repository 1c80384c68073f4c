//! Split the linear index space of a `RangeSet` into contiguous worker slices.

use num_integer::Integer;

use crate::range::{Quadruple, RangeSet};

/// Half-open index interval `[start, end)` handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub id: usize,
    pub start: u128,
    pub end: u128,
}

impl Slice {
    pub fn len(&self) -> u128 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Quadruples of this slice, in enumeration order.
    pub fn quadruples(self, ranges: RangeSet) -> impl Iterator<Item = Quadruple> {
        (self.start..self.end).map(move |i| ranges.quadruple_at(i))
    }
}

/// Partition `ranges` into `min(workers, total)` near-equal slices.
///
/// With `k` slices the first `total % k` slices carry one extra tuple, so
/// every index lands in exactly one slice.
pub fn partition(ranges: &RangeSet, workers: usize) -> Vec<Slice> {
    let total = ranges.total();
    let k = (workers.max(1) as u128).min(total);
    let (base, extra) = total.div_rem(&k);

    let mut slices = Vec::with_capacity(k as usize);
    let mut start = 0u128;
    for id in 0..k {
        let len = if id < extra { base + 1 } else { base };
        slices.push(Slice {
            id: id as usize,
            start,
            end: start + len,
        });
        start += len;
    }

    debug_assert_eq!(start, total);
    log::debug!(
        "Partitioned {} tuples into {} slices (base {}, {} with one extra)",
        total,
        k,
        base,
        extra
    );
    slices
}
