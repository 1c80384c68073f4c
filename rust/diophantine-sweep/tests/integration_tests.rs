//! Integration tests for the diophantine-sweep crate.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;

use num_bigint::BigInt;
use num_traits::Signed;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use diophantine_sweep::check::{Evaluator, TARGET};
use diophantine_sweep::config::SweepConfig;
use diophantine_sweep::partition::partition;
use diophantine_sweep::publish::{PublishError, PublishOutcome, RemoteFile, RemoteStore, RepoTarget};
use diophantine_sweep::range::{Quadruple, RangeSet, SearchRange};
use diophantine_sweep::worker::Delivery;
use diophantine_sweep::{publish_sweep, run_sweep, SweepError};

fn ranges(a: (i64, i64), b: (i64, i64), c: (i64, i64), d: (i64, i64)) -> RangeSet {
    RangeSet::new(
        SearchRange::new(a.0, a.1).unwrap(),
        SearchRange::new(b.0, b.1).unwrap(),
        SearchRange::new(c.0, c.1).unwrap(),
        SearchRange::new(d.0, d.1).unwrap(),
    )
    .unwrap()
}

fn config(dir: &Path, workers: usize, delivery: Delivery) -> SweepConfig {
    SweepConfig {
        workers,
        delivery,
        channel_capacity: 8,
        output_dir: dir.to_path_buf(),
        ..SweepConfig::default()
    }
}

fn read_checks(path: &Path) -> Vec<serde_json::Value> {
    let text = std::fs::read_to_string(path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    doc["checks"].as_array().unwrap().clone()
}

fn sorted_by_tuple(mut checks: Vec<serde_json::Value>) -> Vec<serde_json::Value> {
    checks.sort_by_key(|c| {
        (
            c["a"].as_i64().unwrap(),
            c["b"].as_i64().unwrap(),
            c["c"].as_i64().unwrap(),
            c["d"].as_i64().unwrap(),
        )
    });
    checks
}

#[test]
fn test_known_solution_found() {
    let dir = tempfile::tempdir().unwrap();
    let r = ranges((2, 2), (3, 3), (2, 2), (1, 1));
    let outcome = run_sweep(&r, &config(dir.path(), 4, Delivery::Streaming)).unwrap();

    let d = &outcome.diagnostics;
    assert_eq!(d.total_checks, 1);
    assert_eq!(d.solutions, vec![Quadruple::new(2, 3, 2, 1)]);
    assert_eq!(d.min_abs_error, Some(BigInt::from(0)));

    let checks = read_checks(&outcome.document_path);
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0]["value"], 6);
    assert_eq!(checks[0]["error"], 0);
}

#[test]
fn test_ones_are_not_a_solution() {
    let dir = tempfile::tempdir().unwrap();
    let r = ranges((1, 1), (1, 1), (1, 1), (1, 1));
    let outcome = run_sweep(&r, &config(dir.path(), 2, Delivery::Batched)).unwrap();

    assert!(outcome.diagnostics.solutions.is_empty());
    let checks = read_checks(&outcome.document_path);
    assert_eq!(checks[0]["value"], 0);
    assert_eq!(checks[0]["error"], -6);
    assert_eq!(checks[0]["normalized_error"], "-6e0");
}

#[test]
fn test_partition_covers_every_tuple_once() {
    let mut rng = StdRng::seed_from_u64(12345);
    for _ in 0..50 {
        let mut side = |lo: i64| {
            let min = rng.gen_range(lo..5);
            let max = min + rng.gen_range(0..4);
            (min, max)
        };
        let r = ranges(side(-5), side(0), side(-5), side(0));
        let workers = rng.gen_range(1..20);

        let slices = partition(&r, workers);
        let mut seen = HashSet::new();
        let mut count = 0u128;
        for slice in &slices {
            for q in slice.quadruples(r) {
                assert!(seen.insert(q), "duplicate {} with {} workers", q, workers);
                count += 1;
            }
        }
        assert_eq!(count, r.total());

        let expected: HashSet<Quadruple> = (0..r.total()).map(|i| r.quadruple_at(i)).collect();
        assert_eq!(seen, expected);
    }
}

#[test]
fn test_error_is_exact_value_minus_target() {
    let evaluator = Evaluator::new(TARGET, 1 << 20);
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let q = Quadruple::new(
            rng.gen_range(-50..50),
            rng.gen_range(0..60),
            rng.gen_range(-50..50),
            rng.gen_range(0..60),
        );
        let record = evaluator.check(q);
        let expected = BigInt::from(q.a).pow(q.b) - BigInt::from(q.c).pow(q.d) - BigInt::from(TARGET);
        assert_eq!(record.error, Some(expected), "tuple {}", q);
    }
}

#[test]
fn test_repeated_runs_give_identical_checks() {
    let r = ranges((-3, 4), (0, 5), (-2, 3), (0, 4));

    let dir_a = tempfile::tempdir().unwrap();
    let first = run_sweep(&r, &config(dir_a.path(), 7, Delivery::Streaming)).unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let second = run_sweep(&r, &config(dir_b.path(), 3, Delivery::Batched)).unwrap();

    let a = sorted_by_tuple(read_checks(&first.document_path));
    let b = sorted_by_tuple(read_checks(&second.document_path));
    assert_eq!(a.len() as u128, r.total());
    assert_eq!(a, b);

    let (da, db) = (&first.diagnostics, &second.diagnostics);
    assert_eq!(da.solutions, db.solutions);
    assert_eq!(da.min_abs_error, db.min_abs_error);
    assert_eq!(da.best, db.best);
    assert_eq!(da.mean_abs_error, db.mean_abs_error);
    assert_eq!(da.top_errors, db.top_errors);
}

#[test]
fn test_best_record_has_smallest_error() {
    let dir = tempfile::tempdir().unwrap();
    let r = ranges((3, 9), (2, 4), (3, 9), (2, 4));
    let outcome = run_sweep(&r, &config(dir.path(), 5, Delivery::Streaming)).unwrap();

    let evaluator = Evaluator::new(TARGET, 1 << 20);
    let brute = (0..r.total())
        .map(|i| evaluator.check(r.quadruple_at(i)))
        .min_by(|x, y| {
            let key = |rec: &diophantine_sweep::check::CheckRecord| (rec.error.as_ref().unwrap().abs(), rec.quad);
            key(x).cmp(&key(y))
        })
        .unwrap();

    assert_eq!(outcome.diagnostics.best.as_ref(), Some(&brute));
    assert_eq!(outcome.diagnostics.min_abs_error, brute.abs_error());
}

#[test]
fn test_overflow_does_not_abort_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let r = ranges((2, 1000), (50, 50), (2, 2), (1, 1));
    let cfg = SweepConfig {
        magnitude_ceiling_bits: 200,
        ..config(dir.path(), 4, Delivery::Streaming)
    };
    let outcome = run_sweep(&r, &cfg).unwrap();
    let d = &outcome.diagnostics;
    assert_eq!(d.total_checks, 999);
    assert!(d.overflow_count > 0 && d.overflow_count < 999);
    assert_eq!(d.mean_abs_error, None);

    let checks = read_checks(&outcome.document_path);
    assert!(checks.iter().any(|c| c["value"] == "overflow" && c["error"].is_null()));
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingStore {
    existing: Option<String>,
    fail: bool,
    created: RefCell<Vec<String>>,
    updated: RefCell<Vec<(String, String)>>,
    bodies: RefCell<Vec<Vec<u8>>>,
}

impl RemoteStore for RecordingStore {
    fn get_file(&self, _: &RepoTarget) -> Result<Option<RemoteFile>, PublishError> {
        if self.fail {
            return Err(PublishError::Transport("network unreachable".into()));
        }
        Ok(self.existing.clone().map(|revision| RemoteFile { revision }))
    }

    fn create_file(&self, target: &RepoTarget, content: &[u8], _: &str) -> Result<(), PublishError> {
        self.created.borrow_mut().push(target.path.clone());
        self.bodies.borrow_mut().push(content.to_vec());
        Ok(())
    }

    fn update_file(
        &self,
        target: &RepoTarget,
        content: &[u8],
        _: &str,
        revision: &str,
    ) -> Result<(), PublishError> {
        self.updated
            .borrow_mut()
            .push((target.path.clone(), revision.to_string()));
        self.bodies.borrow_mut().push(content.to_vec());
        Ok(())
    }
}

fn small_sweep(dir: &Path) -> (diophantine_sweep::SweepOutcome, SweepConfig) {
    let cfg = config(dir, 2, Delivery::Streaming);
    let outcome = run_sweep(&ranges((1, 3), (1, 3), (1, 3), (1, 3)), &cfg).unwrap();
    (outcome, cfg)
}

#[test]
fn test_publish_updates_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (outcome, cfg) = small_sweep(dir.path());
    let store = RecordingStore {
        existing: Some("sha-1".into()),
        ..RecordingStore::default()
    };
    let target: RepoTarget = "octo/results/runs/latest.json".parse().unwrap();

    let result = publish_sweep(&outcome, &store, &target, &cfg).unwrap();
    assert_eq!(result, PublishOutcome::Updated { previous_revision: "sha-1".into() });
    assert_eq!(*store.updated.borrow(), vec![("runs/latest.json".to_string(), "sha-1".to_string())]);
    assert!(store.created.borrow().is_empty());

    let body: serde_json::Value = serde_json::from_slice(&store.bodies.borrow()[0]).unwrap();
    assert_eq!(body["checks"].as_array().unwrap().len(), 81);
    assert_eq!(body["diagnostics"]["solution_count"], 2);
    assert!(!outcome.document_path.exists(), "local copy removed after push");
}

#[test]
fn test_publish_creates_missing_file_and_keeps_local() {
    let dir = tempfile::tempdir().unwrap();
    let (outcome, mut cfg) = small_sweep(dir.path());
    cfg.keep_local = true;
    let store = RecordingStore::default();
    let target: RepoTarget = "octo/results/new.json".parse().unwrap();

    let result = publish_sweep(&outcome, &store, &target, &cfg).unwrap();
    assert_eq!(result, PublishOutcome::Created);
    assert_eq!(*store.created.borrow(), vec!["new.json".to_string()]);
    assert!(store.updated.borrow().is_empty());
    assert!(outcome.document_path.exists());
}

#[test]
fn test_publish_failure_keeps_local_copy() {
    let dir = tempfile::tempdir().unwrap();
    let (outcome, cfg) = small_sweep(dir.path());
    let store = RecordingStore {
        fail: true,
        ..RecordingStore::default()
    };
    let target: RepoTarget = "octo/results/new.json".parse().unwrap();

    let err = publish_sweep(&outcome, &store, &target, &cfg).unwrap_err();
    match err {
        SweepError::Publish { source, local } => {
            assert!(matches!(source, PublishError::Transport(_)));
            assert_eq!(local, outcome.document_path);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(outcome.document_path.exists());
    assert!(store.created.borrow().is_empty());
}
