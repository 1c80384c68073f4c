//! Inclusive search ranges and the mixed-radix index space over (a, b, c, d).
//!
//! A `RangeSet` fixes the enumeration order used everywhere else: `a` is the
//! most significant digit and `d` the least, so index 0 is
//! `(a.min, b.min, c.min, d.min)` and the last index is the four maxima.

use serde::Serialize;
use std::fmt;

/// Errors raised while building ranges or interval schedules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("expected two integers \"min max\", got {0:?}")]
    Parse(String),

    #[error("range{} is inverted: min {min} > max {max}", for_var(.var))]
    Inverted { var: Option<char>, min: i64, max: i64 },

    #[error("exponent range for {var} must lie within [0, {}], got [{min}, {max}]", u32::MAX)]
    ExponentOutOfBounds { var: char, min: i64, max: i64 },

    #[error("search space has more than {} tuples", u128::MAX)]
    TooLarge,

    #[error("interval width must be at least 1, got {0}")]
    ZeroWidth(i64),

    #[error("interval start {start} lies beyond the absolute maximum {max}")]
    EmptySchedule { start: i64, max: i64 },
}

fn for_var(var: &Option<char>) -> String {
    var.map(|v| format!(" for {}", v)).unwrap_or_default()
}

/// Inclusive integer range `[min, max]` for one search variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SearchRange {
    pub min: i64,
    pub max: i64,
}

impl SearchRange {
    /// Build a range, rejecting `min > max`.
    pub fn new(min: i64, max: i64) -> Result<Self, RangeError> {
        if min > max {
            return Err(RangeError::Inverted {
                var: None,
                min,
                max,
            });
        }
        Ok(SearchRange { min, max })
    }

    /// Range holding exactly one value.
    pub fn single(value: i64) -> Self {
        SearchRange {
            min: value,
            max: value,
        }
    }

    /// Parse `"min max"` (whitespace or comma separated).
    pub fn parse(text: &str) -> Result<Self, RangeError> {
        let parts: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() != 2 {
            return Err(RangeError::Parse(text.trim().to_string()));
        }
        let min = parts[0]
            .parse::<i64>()
            .map_err(|_| RangeError::Parse(text.trim().to_string()))?;
        let max = parts[1]
            .parse::<i64>()
            .map_err(|_| RangeError::Parse(text.trim().to_string()))?;
        Self::new(min, max)
    }

    /// Number of values in the range; zero if `min > max`.
    pub fn len(&self) -> u128 {
        if self.is_empty() {
            return 0;
        }
        (self.max as i128 - self.min as i128 + 1) as u128
    }

    /// Only possible for a range built from its public fields.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn contains(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Value at `offset` from `min`. `offset` must be below `len()`.
    fn nth(&self, offset: u128) -> i64 {
        (self.min as i128 + offset as i128) as i64
    }

    fn offset_of(&self, value: i64) -> u128 {
        (value as i128 - self.min as i128) as u128
    }

    fn check_exponent(&self, var: char) -> Result<(), RangeError> {
        if self.min < 0 || self.max > u32::MAX as i64 {
            return Err(RangeError::ExponentOutOfBounds {
                var,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl fmt::Display for SearchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// One candidate assignment: bases `a`, `c` and exponents `b`, `d`.
///
/// The derived ordering is lexicographic over `(a, b, c, d)`, which is the
/// same as enumeration order within any `RangeSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Quadruple {
    pub a: i64,
    pub b: u32,
    pub c: i64,
    pub d: u32,
}

impl Quadruple {
    pub fn new(a: i64, b: u32, c: i64, d: u32) -> Self {
        Quadruple { a, b, c, d }
    }
}

impl fmt::Display for Quadruple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.a, self.b, self.c, self.d)
    }
}

/// Validated ranges for all four variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeSet {
    a: SearchRange,
    b: SearchRange,
    c: SearchRange,
    d: SearchRange,
    #[serde(skip)]
    total: u128,
}

impl RangeSet {
    /// Validate four ranges. Exponent ranges (`b`, `d`) must fit in `u32`.
    pub fn new(
        a: SearchRange,
        b: SearchRange,
        c: SearchRange,
        d: SearchRange,
    ) -> Result<Self, RangeError> {
        for (var, r) in [('a', &a), ('b', &b), ('c', &c), ('d', &d)] {
            if r.min > r.max {
                return Err(RangeError::Inverted {
                    var: Some(var),
                    min: r.min,
                    max: r.max,
                });
            }
        }
        b.check_exponent('b')?;
        d.check_exponent('d')?;

        let total = a
            .len()
            .checked_mul(b.len())
            .and_then(|n| n.checked_mul(c.len()))
            .and_then(|n| n.checked_mul(d.len()))
            .ok_or(RangeError::TooLarge)?;

        Ok(RangeSet {
            a,
            b,
            c,
            d,
            total,
        })
    }

    /// Same range for every variable (used by the interval loop).
    pub fn uniform(range: SearchRange) -> Result<Self, RangeError> {
        Self::new(range, range, range, range)
    }

    pub fn a(&self) -> SearchRange {
        self.a
    }

    pub fn b(&self) -> SearchRange {
        self.b
    }

    pub fn c(&self) -> SearchRange {
        self.c
    }

    pub fn d(&self) -> SearchRange {
        self.d
    }

    /// Size of the Cartesian product.
    pub fn total(&self) -> u128 {
        self.total
    }

    /// Quadruple at linear `index` in enumeration order.
    pub fn quadruple_at(&self, index: u128) -> Quadruple {
        debug_assert!(index < self.total, "index {} out of {}", index, self.total);
        let mut rest = index;

        let d = rest % self.d.len();
        rest /= self.d.len();
        let c = rest % self.c.len();
        rest /= self.c.len();
        let b = rest % self.b.len();
        rest /= self.b.len();
        let a = rest;

        Quadruple {
            a: self.a.nth(a),
            b: self.b.nth(b) as u32,
            c: self.c.nth(c),
            d: self.d.nth(d) as u32,
        }
    }

    /// Linear index of `q`, or `None` if it lies outside the set.
    pub fn index_of(&self, q: &Quadruple) -> Option<u128> {
        let inside = self.a.contains(q.a)
            && self.b.contains(q.b as i64)
            && self.c.contains(q.c)
            && self.d.contains(q.d as i64);
        if !inside {
            return None;
        }
        let mut index = self.a.offset_of(q.a);
        index = index * self.b.len() + self.b.offset_of(q.b as i64);
        index = index * self.c.len() + self.c.offset_of(q.c);
        index = index * self.d.len() + self.d.offset_of(q.d as i64);
        Some(index)
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a∈{} b∈{} c∈{} d∈{}",
            self.a, self.b, self.c, self.d
        )
    }
}
