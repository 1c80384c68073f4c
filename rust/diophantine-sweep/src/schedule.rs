//! Interval loop: repeated sweeps over successive equal-width sub-ranges.
//!
//! Every variable uses the same interval `[lo, lo + width − 1]`, clamped to
//! the absolute maximum. After each sweep the driver either advances on its
//! own (`Advance::Auto`) or asks the operator (`Advance::Manual`).

use crate::range::{RangeError, SearchRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSchedule {
    start: i64,
    width: i64,
    absolute_max: i64,
}

impl IntervalSchedule {
    /// `start` must be non-negative because the interval doubles as the
    /// exponent range, and `absolute_max` must fit in `u32` for the same
    /// reason.
    pub fn new(start: i64, width: i64, absolute_max: i64) -> Result<Self, RangeError> {
        if width < 1 {
            return Err(RangeError::ZeroWidth(width));
        }
        if start > absolute_max {
            return Err(RangeError::EmptySchedule {
                start,
                max: absolute_max,
            });
        }
        if start < 0 || absolute_max > u32::MAX as i64 {
            return Err(RangeError::ExponentOutOfBounds {
                var: '*',
                min: start,
                max: absolute_max,
            });
        }
        Ok(IntervalSchedule {
            start,
            width,
            absolute_max,
        })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn absolute_max(&self) -> i64 {
        self.absolute_max
    }

    pub fn intervals(&self) -> Intervals {
        Intervals {
            next: Some(self.start),
            width: self.width,
            max: self.absolute_max,
        }
    }
}

/// Iterator over the intervals of a schedule.
#[derive(Debug, Clone)]
pub struct Intervals {
    next: Option<i64>,
    width: i64,
    max: i64,
}

impl Iterator for Intervals {
    type Item = SearchRange;

    fn next(&mut self) -> Option<SearchRange> {
        let lo = self.next.filter(|&lo| lo <= self.max)?;
        let hi = lo.saturating_add(self.width - 1).min(self.max);
        self.next = hi.checked_add(1);
        Some(SearchRange { min: lo, max: hi })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Run(SearchRange),
    Advance,
    Stop,
}

/// Drive the loop: run each interval, then advance or stop.
///
/// `confirm` is only consulted in manual mode, with the interval that would
/// run next. Returns the number of completed sweeps.
pub fn drive<E, F, C>(
    schedule: &IntervalSchedule,
    advance: Advance,
    mut run_once: F,
    mut confirm: C,
) -> Result<usize, E>
where
    F: FnMut(SearchRange) -> Result<(), E>,
    C: FnMut(SearchRange) -> Result<bool, E>,
{
    let mut intervals = schedule.intervals();
    let mut completed = 0;
    let mut state = match intervals.next() {
        Some(first) => State::Run(first),
        None => State::Stop,
    };

    loop {
        state = match state {
            State::Run(interval) => {
                log::info!("Interval sweep {} over {}", completed + 1, interval);
                run_once(interval)?;
                completed += 1;
                State::Advance
            }
            State::Advance => match intervals.next() {
                None => {
                    log::info!("Reached absolute maximum {}", schedule.absolute_max());
                    State::Stop
                }
                Some(next) if advance == Advance::Auto => State::Run(next),
                Some(next) => {
                    if confirm(next)? {
                        State::Run(next)
                    } else {
                        log::info!("Operator stopped before {}", next);
                        State::Stop
                    }
                }
            },
            State::Stop => return Ok(completed),
        };
    }
}
