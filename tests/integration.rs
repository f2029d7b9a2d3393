//! Integration tests for the load harness
//!
//! Run these tests with: cargo test --test integration
//!
//! Harness properties run against an in-process memory backend; the
//! end-to-end scenarios use a temporary SQLite file. Postgres and Redis are
//! optional here: when they are not reachable they show up as skipped.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use kvbench::config::{BackendSelector, BenchmarkConfig, ConnectionSettings, Mode, OpKind};
use kvbench::error::{SetupError, StoreError, StoreResult};
use kvbench::harness::{BackendOutcome, LoadHarness};
use kvbench::report::BenchmarkReport;
use kvbench::stats::summarize;
use kvbench::store::{self, Backend, Store};

/// Shared state of the memory backend: stored data plus the global order in
/// which operations reached it.
#[derive(Default)]
struct Shared {
    data: Mutex<HashMap<String, Vec<u8>>>,
    log: Mutex<Vec<(OpKind, String)>>,
}

struct MemoryBackend {
    shared: Arc<Shared>,
    /// Fail every n-th put of each session with a timeout.
    fail_every: Option<usize>,
    fail_setup: bool,
}

impl MemoryBackend {
    fn new() -> Self {
        MemoryBackend {
            shared: Arc::new(Shared::default()),
            fail_every: None,
            fail_setup: false,
        }
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn prepare(&self) -> Result<(), SetupError> {
        if self.fail_setup {
            return Err(SetupError::Connect {
                backend: "memory".to_string(),
                reason: "refused".to_string(),
            });
        }
        Ok(())
    }

    fn connect(&self) -> Result<Box<dyn Store>, SetupError> {
        Ok(Box::new(MemoryStore {
            shared: Arc::clone(&self.shared),
            fail_every: self.fail_every,
            puts: 0,
        }))
    }
}

struct MemoryStore {
    shared: Arc<Shared>,
    fail_every: Option<usize>,
    puts: usize,
}

impl Store for MemoryStore {
    fn put(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.puts += 1;
        if let Some(every) = self.fail_every {
            if self.puts % every == 0 {
                return Err(StoreError::Timeout("injected".to_string()));
            }
        }
        self.shared
            .log
            .lock()
            .push((OpKind::Write, key.to_string()));
        self.shared
            .data
            .lock()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&mut self, key: &str) -> StoreResult<Vec<u8>> {
        self.shared.log.lock().push((OpKind::Read, key.to_string()));
        self.shared
            .data
            .lock()
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

fn config(ops: usize, payload_size: usize, mode: Mode, concurrency: usize) -> BenchmarkConfig {
    BenchmarkConfig {
        ops,
        payload_size,
        mode,
        concurrency,
        warmup: 0,
        seed: Some(7),
        ..Default::default()
    }
    .validate()
    .unwrap()
}

fn completed(outcome: &BackendOutcome) -> &kvbench::BackendRun {
    match outcome {
        BackendOutcome::Completed(run) => run,
        BackendOutcome::Skipped { reason, .. } => panic!("backend skipped: {}", reason),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_mode_records_exactly_ops_samples() {
    for concurrency in [1, 4, 7] {
        let backend = Arc::new(MemoryBackend::new());
        let harness = LoadHarness::new(config(100, 32, Mode::Write, concurrency));
        let run = harness.run_backend(backend.clone()).await.unwrap();

        assert_eq!(run.results.len(), 1);
        let writes = run.result(OpKind::Write).unwrap();
        assert_eq!(writes.len(), 100);
        assert_eq!(writes.successes() + writes.failures(), 100);
        assert_eq!(backend.shared.data.lock().len(), 100);
        assert!(backend.shared.data.lock().values().all(|v| v.len() == 32));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrency_does_not_change_key_set() {
    let mut key_sets = Vec::new();
    for concurrency in [1, 4] {
        let backend = Arc::new(MemoryBackend::new());
        let harness = LoadHarness::new(config(60, 8, Mode::Write, concurrency));
        let run = harness.run_backend(backend.clone()).await.unwrap();

        let sampled: BTreeSet<String> = run
            .result(OpKind::Write)
            .unwrap()
            .samples()
            .iter()
            .map(|s| s.key.clone())
            .collect();
        let stored: BTreeSet<String> = backend.shared.data.lock().keys().cloned().collect();
        assert_eq!(sampled, stored);
        key_sets.push(stored);
    }
    assert_eq!(key_sets[0], key_sets[1]);
    assert_eq!(key_sets[0].len(), 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_both_mode_writes_everything_before_reading() {
    let backend = Arc::new(MemoryBackend::new());
    let harness = LoadHarness::new(config(50, 16, Mode::Both, 4));
    let run = harness.run_backend(backend.clone()).await.unwrap();

    let writes = run.result(OpKind::Write).unwrap();
    let reads = run.result(OpKind::Read).unwrap();
    assert_eq!(writes.len(), 50);
    assert_eq!(reads.len(), 50);
    assert_eq!(reads.failures(), 0);

    let log = backend.shared.log.lock();
    let last_write = log.iter().rposition(|(op, _)| *op == OpKind::Write).unwrap();
    let first_read = log.iter().position(|(op, _)| *op == OpKind::Read).unwrap();
    assert!(last_write < first_read);

    let distinct_workers: BTreeSet<usize> = reads.samples().iter().map(|s| s.worker).collect();
    assert_eq!(distinct_workers.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_mode_alone_records_missing_keys_as_failures() {
    let backend = Arc::new(MemoryBackend::new());
    let harness = LoadHarness::new(config(20, 16, Mode::Read, 2));
    let run = harness.run_backend(backend.clone()).await.unwrap();

    let reads = run.result(OpKind::Read).unwrap();
    assert_eq!(reads.len(), 20);
    assert!(reads
        .samples()
        .iter()
        .all(|s| s.outcome.error() == Some(&StoreError::NotFound)));
    assert!(backend.shared.data.lock().is_empty());

    let stats = summarize(reads);
    assert_eq!(stats.count, 0);
    assert_eq!(stats.failures, 20);
    assert!(stats.latency.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failures_are_recorded_not_dropped() {
    let backend = Arc::new(MemoryBackend {
        fail_every: Some(10),
        ..MemoryBackend::new()
    });
    let harness = LoadHarness::new(config(100, 4, Mode::Write, 1));
    let run = harness.run_backend(backend).await.unwrap();

    let writes = run.result(OpKind::Write).unwrap();
    assert_eq!(writes.len(), 100);
    assert_eq!(writes.failures(), 10);

    let stats = summarize(writes);
    assert_eq!(stats.count, 90);
    assert!((stats.failure_rate() - 0.1).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_setup_failure_skips_only_that_backend() {
    let broken: Arc<dyn Backend> = Arc::new(MemoryBackend {
        fail_setup: true,
        ..MemoryBackend::new()
    });
    let healthy: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let harness = LoadHarness::new(config(10, 4, Mode::Write, 2));
    let outcomes = harness.run_all(vec![broken, healthy]).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0], BackendOutcome::Skipped { .. }));
    assert_eq!(completed(&outcomes[1]).result(OpKind::Write).unwrap().len(), 10);

    let report = BenchmarkReport::new(harness.config(), &outcomes);
    assert!(report.any_completed());
    assert_eq!(report.skipped.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sqlite_write_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        backends: BackendSelector::Sqlite,
        connections: ConnectionSettings {
            sqlite_path: dir.path().join("bench.db"),
            ..ConnectionSettings::default()
        },
        out: dir.path().join("results/result.csv"),
        ..config(100, 64, Mode::Write, 1)
    };
    let backends = store::backends_for(&config);
    let harness = LoadHarness::new(config);
    let outcomes = harness.run_all(backends).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    let run = completed(&outcomes[0]);
    assert_eq!(run.backend, "sqlite");
    let writes = run.result(OpKind::Write).unwrap();
    assert_eq!(writes.len(), 100);

    let stats = summarize(writes);
    assert_eq!(stats.count, 100);
    let latency = stats.latency.unwrap();
    assert!(latency.p50_ms <= latency.p95_ms && latency.p95_ms <= latency.p99_ms);

    let report = BenchmarkReport::new(harness.config(), &outcomes);
    kvbench::report::export(harness.config(), &outcomes, &report).unwrap();
    let raw = std::fs::read_to_string(dir.path().join("results/result.csv")).unwrap();
    assert_eq!(raw.lines().count(), 101);
    assert!(dir.path().join("results/result_summary.csv").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_all_backends_both_mode_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let config = BenchmarkConfig {
        backends: BackendSelector::All,
        connections: ConnectionSettings {
            sqlite_path: dir.path().join("bench.db"),
            connect_timeout: Duration::from_millis(500),
            ..ConnectionSettings::default()
        },
        ..config(50, 16, Mode::Both, 4)
    };
    let backends = store::backends_for(&config);
    let harness = LoadHarness::new(config);
    let outcomes = harness.run_all(backends).await.unwrap();

    let names: Vec<&str> = outcomes.iter().map(|o| o.backend()).collect();
    assert_eq!(names, vec!["sqlite", "postgres", "redis"]);

    // SQLite never needs a server, so it always completes.
    assert!(matches!(outcomes[0], BackendOutcome::Completed(_)));

    for outcome in &outcomes {
        if let BackendOutcome::Completed(run) = outcome {
            assert_eq!(run.results.len(), 2);
            assert_eq!(run.results[0].op(), OpKind::Write);
            assert_eq!(run.results[1].op(), OpKind::Read);
            assert_eq!(run.result(OpKind::Write).unwrap().len(), 50);
            assert_eq!(run.result(OpKind::Read).unwrap().len(), 50);
            assert_eq!(run.workers, 4);
        }
    }

    let sqlite = completed(&outcomes[0]);
    assert_eq!(sqlite.result(OpKind::Read).unwrap().failures(), 0);
}
