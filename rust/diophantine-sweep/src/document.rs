//! Streaming writer for the result document.
//!
//! Layout: `{"checks":[<record>,...],"diagnostics":{...}}`. Records are
//! appended one at a time as they arrive, so only the diagnostics are held in
//! memory until the end of a sweep.

use num_bigint::BigInt;
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::aggregate::{Diagnostics, ErrorBucket};
use crate::check::{normalize, CheckRecord, Evaluation, OVERFLOW};
use crate::range::{Quadruple, RangeSet};
use crate::worker::Delivery;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialization settings passed explicitly to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Integers with more decimal digits than this are written as their
    /// normalized scientific string instead of a JSON number.
    ///
    /// The JSON stays valid at any setting, but readers that parse numbers
    /// as f64 (serde_json without `arbitrary_precision`, most JavaScript)
    /// reject or round integers above roughly 308 digits. Lower this limit
    /// when the document must round-trip through such a reader.
    pub max_integer_digits: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        DocumentOptions {
            max_integer_digits: 100_000,
        }
    }
}

/// Local file name for a sweep over `ranges`.
pub fn local_file_name(ranges: &RangeSet) -> String {
    format!(
        "sweep_a{}_{}_b{}_{}_c{}_{}_d{}_{}.json",
        ranges.a().min,
        ranges.a().max,
        ranges.b().min,
        ranges.b().max,
        ranges.c().min,
        ranges.c().max,
        ranges.d().min,
        ranges.d().max
    )
}

/// Exact integer written as a bare JSON number when short enough.
struct ExactInt<'a> {
    value: &'a BigInt,
    max_digits: usize,
}

impl Serialize for ExactInt<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let digits = self.value.to_string();
        if digits.trim_start_matches('-').len() > self.max_digits {
            return s.serialize_str(&normalize(self.value));
        }
        serde_json::value::RawValue::from_string(digits)
            .map_err(S::Error::custom)?
            .serialize(s)
    }
}

struct ValueField<'a> {
    value: &'a Evaluation,
    max_digits: usize,
}

impl Serialize for ValueField<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Evaluation::Exact(v) => ExactInt {
                value: v,
                max_digits: self.max_digits,
            }
            .serialize(s),
            Evaluation::Overflow => s.serialize_str(OVERFLOW),
        }
    }
}

#[derive(Serialize)]
struct RecordView<'a> {
    a: i64,
    b: u32,
    c: i64,
    d: u32,
    value: ValueField<'a>,
    error: Option<ExactInt<'a>>,
    normalized_error: &'a str,
}

impl<'a> RecordView<'a> {
    fn new(record: &'a CheckRecord, options: DocumentOptions) -> Self {
        RecordView {
            a: record.quad.a,
            b: record.quad.b,
            c: record.quad.c,
            d: record.quad.d,
            value: ValueField {
                value: &record.value,
                max_digits: options.max_integer_digits,
            },
            error: record.error.as_ref().map(|e| ExactInt {
                value: e,
                max_digits: options.max_integer_digits,
            }),
            normalized_error: &record.normalized_error,
        }
    }
}

#[derive(Serialize)]
struct DiagnosticsView<'a> {
    target: i64,
    sign_convention: &'static str,
    ranges: &'a RangeSet,
    cores: usize,
    workers: usize,
    delivery: Delivery,
    elapsed_secs: f64,
    total_checks: u64,
    solution_count: usize,
    solutions: &'a [Quadruple],
    overflow_count: u64,
    failed_count: u64,
    min_abs_error: Option<ExactInt<'a>>,
    mean_abs_error: Option<f64>,
    top_errors: &'a [ErrorBucket],
    best: Option<RecordView<'a>>,
}

impl<'a> DiagnosticsView<'a> {
    fn new(d: &'a Diagnostics, options: DocumentOptions) -> Self {
        DiagnosticsView {
            target: d.target,
            sign_convention: "value - target",
            ranges: &d.ranges,
            cores: d.cores,
            workers: d.workers,
            delivery: d.delivery,
            elapsed_secs: d.elapsed.as_secs_f64(),
            total_checks: d.total_checks,
            solution_count: d.solution_count(),
            solutions: &d.solutions,
            overflow_count: d.overflow_count,
            failed_count: d.failed_count,
            min_abs_error: d.min_abs_error.as_ref().map(|v| ExactInt {
                value: v,
                max_digits: options.max_integer_digits,
            }),
            mean_abs_error: d.mean_abs_error,
            top_errors: &d.top_errors,
            best: d.best.as_ref().map(|r| RecordView::new(r, options)),
        }
    }
}

/// Incremental writer for one result document.
pub struct DocumentWriter<W: Write> {
    out: W,
    options: DocumentOptions,
    records: u64,
}

impl DocumentWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the document header.
    pub fn create(path: &Path, options: DocumentOptions) -> Result<Self, DocumentError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        log::debug!("Writing result document to {}", path.display());
        Self::new(BufWriter::new(file), options)
    }
}

impl<W: Write> DocumentWriter<W> {
    pub fn new(mut out: W, options: DocumentOptions) -> Result<Self, DocumentError> {
        out.write_all(b"{\"checks\":[")?;
        Ok(DocumentWriter {
            out,
            options,
            records: 0,
        })
    }

    pub fn write_record(&mut self, record: &CheckRecord) -> Result<(), DocumentError> {
        let sep: &[u8] = if self.records == 0 { b"\n" } else { b",\n" };
        self.out.write_all(sep)?;
        serde_json::to_writer(&mut self.out, &RecordView::new(record, self.options))?;
        self.records += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Close the checks array, append diagnostics and flush.
    pub fn finish(mut self, diagnostics: &Diagnostics) -> Result<W, DocumentError> {
        self.out.write_all(b"\n],\"diagnostics\":")?;
        serde_json::to_writer_pretty(
            &mut self.out,
            &DiagnosticsView::new(diagnostics, self.options),
        )?;
        self.out.write_all(b"}\n")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Aggregator, RunContext};
    use crate::check::{Evaluator, TARGET};
    use crate::range::SearchRange;
    use std::time::Duration;

    fn ranges() -> RangeSet {
        RangeSet::new(
            SearchRange::new(1, 2).unwrap(),
            SearchRange::new(1, 3).unwrap(),
            SearchRange::single(2),
            SearchRange::single(1),
        )
        .unwrap()
    }

    fn write_doc(ranges: RangeSet, evaluator: &Evaluator, options: DocumentOptions) -> serde_json::Value {
        let mut writer = DocumentWriter::new(Vec::new(), options).unwrap();
        let mut agg = Aggregator::new(3);
        for i in 0..ranges.total() {
            let rec = evaluator.check(ranges.quadruple_at(i));
            agg.observe_record(&rec);
            writer.write_record(&rec).unwrap();
        }
        let diag = agg.finish(RunContext {
            ranges,
            target: TARGET,
            cores: 2,
            workers: 1,
            delivery: Delivery::Streaming,
            elapsed: Duration::from_millis(1),
        });
        let bytes = writer.finish(&diag).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_document_shape() {
        let doc = write_doc(ranges(), &Evaluator::new(TARGET, 1 << 16), DocumentOptions::default());
        let checks = doc["checks"].as_array().unwrap();
        assert_eq!(checks.len(), 6);
        let first = &checks[0];
        assert_eq!(first["a"], 1);
        assert_eq!(first["b"], 1);
        assert_eq!(first["c"], 2);
        assert_eq!(first["d"], 1);
        assert_eq!(first["value"], -1);
        assert_eq!(first["error"], -7);
        assert_eq!(first["normalized_error"], "-7e0");

        let diag = &doc["diagnostics"];
        assert_eq!(diag["target"], 6);
        assert_eq!(diag["sign_convention"], "value - target");
        assert_eq!(diag["solution_count"], 1);
        assert_eq!(diag["solutions"][0]["a"], 2);
        assert_eq!(diag["solutions"][0]["b"], 3);
        assert_eq!(diag["min_abs_error"], 0);
        assert_eq!(diag["ranges"]["a"]["max"], 2);
        assert_eq!(diag["best"]["normalized_error"], "0e0");
        assert_eq!(diag["delivery"], "streaming");
    }

    #[test]
    fn test_overflow_serialized_as_sentinel() {
        let doc = write_doc(ranges(), &Evaluator::new(TARGET, 2), DocumentOptions::default());
        // 2^3 needs more than 2 bits
        let last = doc["checks"].as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["value"], OVERFLOW);
        assert!(last["error"].is_null());
        assert_eq!(last["normalized_error"], OVERFLOW);
        assert!(doc["diagnostics"]["mean_abs_error"].is_null());
    }

    #[test]
    fn test_long_integers_fall_back_to_scientific() {
        let r = RangeSet::new(
            SearchRange::single(10),
            SearchRange::single(30),
            SearchRange::single(1),
            SearchRange::single(0),
        )
        .unwrap();
        let options = DocumentOptions { max_integer_digits: 10 };
        let doc = write_doc(r, &Evaluator::new(TARGET, 1 << 16), options);
        let check = &doc["checks"][0];
        // 10^30 − 1 − 6
        assert_eq!(check["value"], "1e30");
        assert_eq!(check["error"], "1e30");
    }

    #[test]
    fn test_long_integers_written_exactly_by_default() {
        let r = RangeSet::new(
            SearchRange::single(2),
            SearchRange::single(1200),
            SearchRange::single(3),
            SearchRange::single(0),
        )
        .unwrap();
        let rec = Evaluator::new(TARGET, 1 << 16).check(r.quadruple_at(0));
        let exact = rec.value.to_string();
        assert!(exact.len() > 308);

        let mut writer = DocumentWriter::new(Vec::new(), DocumentOptions::default()).unwrap();
        writer.write_record(&rec).unwrap();
        let diag = Aggregator::new(1).finish(RunContext {
            ranges: r,
            target: TARGET,
            cores: 1,
            workers: 1,
            delivery: Delivery::Streaming,
            elapsed: Duration::ZERO,
        });
        let text = String::from_utf8(writer.finish(&diag).unwrap()).unwrap();
        assert!(text.contains(&format!("\"value\":{}", exact)), "value must be a bare exact number");

        // a limit below f64 range keeps the document readable by serde_json
        let doc = write_doc(r, &Evaluator::new(TARGET, 1 << 16), DocumentOptions { max_integer_digits: 300 });
        assert_eq!(doc["checks"][0]["value"], "1.7e361");
    }

    #[test]
    fn test_empty_writer_is_valid_json() {
        let writer = DocumentWriter::new(Vec::new(), DocumentOptions::default()).unwrap();
        assert_eq!(writer.records_written(), 0);
        let diag = Aggregator::new(1).finish(RunContext {
            ranges: ranges(),
            target: TARGET,
            cores: 1,
            workers: 1,
            delivery: Delivery::Batched,
            elapsed: Duration::ZERO,
        });
        let bytes = writer.finish(&diag).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["checks"].as_array().unwrap().is_empty());
        assert!(doc["diagnostics"]["best"].is_null());
    }

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name(&ranges()), "sweep_a1_2_b1_3_c2_2_d1_1.json");
    }
}
