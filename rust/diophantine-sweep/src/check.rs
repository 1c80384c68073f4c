//! Exact evaluation of a^b − c^d for one quadruple.
//!
//! Sign convention: `error = value − target`. A tuple is an exact solution
//! when the error is zero.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use std::fmt;

use crate::range::Quadruple;

/// Right-hand side of a^b − c^d = 6.
pub const TARGET: i64 = 6;

/// Textual marker used in place of values above the magnitude ceiling.
pub const OVERFLOW: &str = "overflow";

/// Result of evaluating a^b − c^d.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Exact(BigInt),
    /// One of the powers would exceed the configured ceiling.
    Overflow,
}

impl Evaluation {
    pub fn exact(&self) -> Option<&BigInt> {
        match self {
            Evaluation::Exact(v) => Some(v),
            Evaluation::Overflow => None,
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Exact(v) => write!(f, "{}", v),
            Evaluation::Overflow => f.write_str(OVERFLOW),
        }
    }
}

/// Outcome of checking one quadruple. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub quad: Quadruple,
    pub value: Evaluation,
    /// `value − target`, absent on overflow.
    pub error: Option<BigInt>,
    /// Scientific form of `error` (see [`normalize`]), or `"overflow"`.
    pub normalized_error: String,
}

impl CheckRecord {
    pub fn is_solution(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.is_zero())
    }

    pub fn abs_error(&self) -> Option<BigInt> {
        self.error.as_ref().map(|e| e.abs())
    }
}

/// Computes check records against a fixed target and magnitude ceiling.
#[derive(Debug, Clone)]
pub struct Evaluator {
    target: BigInt,
    ceiling_bits: u64,
}

impl Evaluator {
    pub fn new(target: i64, ceiling_bits: u64) -> Self {
        Evaluator {
            target: BigInt::from(target),
            ceiling_bits,
        }
    }

    pub fn target(&self) -> &BigInt {
        &self.target
    }

    /// `base^exp`, or `None` when the result could exceed the ceiling.
    pub fn power(&self, base: i64, exp: u32) -> Option<BigInt> {
        if estimated_bits(base, exp) > self.ceiling_bits {
            return None;
        }
        Some(BigInt::from(base).pow(exp))
    }

    /// a^b − c^d with full precision.
    pub fn evaluate(&self, q: Quadruple) -> Evaluation {
        match (self.power(q.a, q.b), self.power(q.c, q.d)) {
            (Some(lhs), Some(rhs)) => Evaluation::Exact(lhs - rhs),
            _ => Evaluation::Overflow,
        }
    }

    pub fn check(&self, q: Quadruple) -> CheckRecord {
        let value = self.evaluate(q);
        let error = value.exact().map(|v| v - &self.target);
        let normalized_error = match &error {
            Some(e) => normalize(e),
            None => OVERFLOW.to_string(),
        };
        CheckRecord {
            quad: q,
            value,
            error,
            normalized_error,
        }
    }
}

/// Upper bound on the bit length of `base^exp`.
///
/// `|base| <= 1` stays within one bit for any exponent.
pub fn estimated_bits(base: i64, exp: u32) -> u64 {
    let magnitude = base.unsigned_abs();
    if magnitude <= 1 || exp == 0 {
        return 1;
    }
    let bits = (u64::BITS - magnitude.leading_zeros()) as u64;
    bits * exp as u64
}

/// Two-significant-digit scientific form used for histogram buckets.
///
/// Rounds half away from zero and drops a trailing zero mantissa digit:
/// `-6 -> "-6e0"`, `1234 -> "1.2e3"`, `995 -> "1e3"`, `0 -> "0e0"`.
pub fn normalize(value: &BigInt) -> String {
    let sign = if value.is_negative() { "-" } else { "" };
    let digits = value.magnitude().to_string();
    let bytes = digits.as_bytes();
    let mut exponent = digits.len() - 1;

    let lead = (bytes[0] - b'0') as u32;
    let mut mantissa = if bytes.len() == 1 {
        lead * 10
    } else {
        lead * 10 + (bytes[1] - b'0') as u32
    };
    if bytes.len() > 2 && bytes[2] >= b'5' {
        mantissa += 1;
        if mantissa == 100 {
            mantissa = 10;
            exponent += 1;
        }
    }

    let (whole, frac) = (mantissa / 10, mantissa % 10);
    if frac == 0 {
        format!("{}{}e{}", sign, whole, exponent)
    } else {
        format!("{}{}.{}e{}", sign, whole, frac, exponent)
    }
}
