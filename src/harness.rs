//! Load harness
//!
//! Drives `ops` operations per phase across `workers` blocking threads.
//! Each worker owns one store session and buffers its samples locally; the
//! buffer is appended to the shared [`ResultCollector`] once, when the
//! worker finishes. Awaiting every worker of a phase is the barrier between
//! the write and read phases.

use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::config::{BenchmarkConfig, OpKind};
use crate::error::{HarnessError, SetupError};
use crate::payload::PayloadGenerator;
use crate::runner::{run_one, Operation, Sample, SampleOrigin};
use crate::store::{Backend, Store};

/// Key for operation `index`. Independent of the worker that runs it.
pub fn key_for(backend: &str, payload_size: usize, index: usize) -> String {
    format!("{}_k_{}_{}", backend, payload_size, index)
}

/// Split `0..ops` into `workers` contiguous ranges whose lengths differ by at
/// most one and sum to `ops`.
pub fn partition(ops: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let base = ops / workers;
    let extra = ops % workers;
    let mut start = 0;
    (0..workers)
        .map(|w| {
            let len = base + usize::from(w < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Shared sink for samples while a phase is running.
pub struct ResultCollector {
    samples: Mutex<Vec<Sample>>,
}

impl ResultCollector {
    pub fn with_capacity(capacity: usize) -> Self {
        ResultCollector {
            samples: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn append(&self, batch: Vec<Sample>) {
        self.samples.lock().extend(batch);
    }

    /// Stop collecting and hand back a read-only result set.
    pub fn freeze(self: Arc<Self>, backend: Arc<str>, op: OpKind, wall: Duration) -> ResultSet {
        let samples = match Arc::try_unwrap(self) {
            Ok(collector) => collector.samples.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.samples.lock()),
        };
        ResultSet {
            backend,
            op,
            samples,
            wall,
        }
    }
}

/// All samples of one (backend, op) phase. Immutable.
#[derive(Debug, Clone)]
pub struct ResultSet {
    backend: Arc<str>,
    op: OpKind,
    samples: Vec<Sample>,
    wall: Duration,
}

impl ResultSet {
    pub fn new(backend: &str, op: OpKind, samples: Vec<Sample>, wall: Duration) -> Self {
        ResultSet {
            backend: Arc::from(backend),
            op,
            samples,
            wall,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn op(&self) -> OpKind {
        self.op
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| s.outcome.is_success())
            .count()
    }

    pub fn failures(&self) -> usize {
        self.len() - self.successes()
    }

    /// Wall-clock time from the first worker starting to the last finishing.
    pub fn wall(&self) -> Duration {
        self.wall
    }

    /// Successful operations per second of wall time.
    pub fn throughput_ops_sec(&self) -> f64 {
        let secs = self.wall.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.successes() as f64 / secs
    }
}

/// Everything measured against one backend.
#[derive(Debug, Clone)]
pub struct BackendRun {
    pub backend: String,
    pub workers: usize,
    pub results: Vec<ResultSet>,
}

impl BackendRun {
    pub fn result(&self, op: OpKind) -> Option<&ResultSet> {
        self.results.iter().find(|r| r.op() == op)
    }
}

#[derive(Debug, Clone)]
pub enum BackendOutcome {
    Completed(BackendRun),
    Skipped { backend: String, reason: SetupError },
}

impl BackendOutcome {
    pub fn backend(&self) -> &str {
        match self {
            BackendOutcome::Completed(run) => &run.backend,
            BackendOutcome::Skipped { backend, .. } => backend,
        }
    }
}

pub struct LoadHarness {
    config: Arc<BenchmarkConfig>,
}

impl LoadHarness {
    pub fn new(config: BenchmarkConfig) -> Self {
        LoadHarness {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run every backend in turn. A backend whose setup fails is skipped.
    pub async fn run_all(
        &self,
        backends: Vec<Arc<dyn Backend>>,
    ) -> Result<Vec<BackendOutcome>, HarnessError> {
        let mut outcomes = Vec::with_capacity(backends.len());
        for backend in backends {
            let name = backend.name().to_string();
            match self.run_backend(backend).await {
                Ok(run) => outcomes.push(BackendOutcome::Completed(run)),
                Err(HarnessError::Setup(reason)) => {
                    warn!(backend = %name, error = %reason, "skipping backend");
                    outcomes.push(BackendOutcome::Skipped {
                        backend: name,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    /// Prepare `backend`, open one session per worker, warm up, then run the
    /// configured phases in order.
    pub async fn run_backend(&self, backend: Arc<dyn Backend>) -> Result<BackendRun, HarnessError> {
        let name: Arc<str> = Arc::from(backend.name());
        let workers = self.config.workers();
        info!(backend = %name, workers, "setting up");

        let mut sessions = self.open_sessions(backend, workers).await?;

        let mut results = Vec::with_capacity(self.config.mode.phases().len());
        for &op in self.config.mode.phases() {
            let (returned, result) = self.run_phase(&name, sessions, op).await?;
            sessions = returned;
            info!(
                backend = %name,
                op = %op,
                samples = result.len(),
                failures = result.failures(),
                wall_ms = result.wall().as_secs_f64() * 1_000.0,
                "phase complete"
            );
            results.push(result);
        }
        close_sessions(sessions).await;

        Ok(BackendRun {
            backend: name.to_string(),
            workers,
            results,
        })
    }

    async fn open_sessions(
        &self,
        backend: Arc<dyn Backend>,
        workers: usize,
    ) -> Result<Vec<Box<dyn Store>>, HarnessError> {
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || -> Result<Vec<Box<dyn Store>>, HarnessError> {
            backend.prepare()?;
            let mut sessions = (0..workers)
                .map(|_| backend.connect())
                .collect::<Result<Vec<_>, SetupError>>()?;
            if let Some(first) = sessions.first_mut() {
                warm_up(&mut **first, &config, backend.name());
            }
            Ok(sessions)
        })
        .await
        .map_err(|e| join_error(0, e))?
    }

    async fn run_phase(
        &self,
        backend: &Arc<str>,
        sessions: Vec<Box<dyn Store>>,
        op: OpKind,
    ) -> Result<(Vec<Box<dyn Store>>, ResultSet), HarnessError> {
        let ops = self.config.ops;
        let payload_size = self.config.payload_size;
        let seeds = PayloadGenerator::from_option(self.config.seed);
        let collector = Arc::new(ResultCollector::with_capacity(ops));
        let ranges = partition(ops, sessions.len());
        info!(backend = %backend, op = %op, ops, workers = sessions.len(), "phase started");

        let started = Instant::now();
        let handles: Vec<_> = sessions
            .into_iter()
            .zip(ranges)
            .enumerate()
            .map(|(worker, (mut session, range))| {
                let collector = Arc::clone(&collector);
                let origin = SampleOrigin {
                    backend: Arc::clone(backend),
                    worker,
                };
                let mut payloads = seeds.for_worker(worker);
                tokio::task::spawn_blocking(move || {
                    let mut local = Vec::with_capacity(range.len());
                    for index in range {
                        let key = key_for(&origin.backend, payload_size, index);
                        let payload = match op {
                            OpKind::Write => payloads.generate(payload_size),
                            OpKind::Read => Vec::new(),
                        };
                        let operation = Operation {
                            op,
                            index,
                            key: &key,
                            payload: &payload,
                        };
                        local.push(run_one(&mut *session, &origin, operation));
                    }
                    collector.append(local);
                    session
                })
            })
            .collect();

        let mut sessions = Vec::with_capacity(handles.len());
        let mut panicked = None;
        for (worker, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    panicked.get_or_insert(join_error(worker, e));
                }
            }
        }
        let wall = started.elapsed();
        if let Some(e) = panicked {
            close_sessions(sessions).await;
            return Err(e);
        }

        Ok((sessions, collector.freeze(Arc::clone(backend), op, wall)))
    }
}

/// Untimed operations on throwaway keys so connection caches and statement
/// caches are hot before measuring.
fn warm_up(store: &mut dyn Store, config: &BenchmarkConfig, backend: &str) {
    let mut payloads = PayloadGenerator::from_option(config.seed);
    for i in 0..config.warmup {
        let key = format!("warmup_{}", i);
        let payload = payloads.generate(config.payload_size);
        if let Err(e) = store.put(&key, &payload) {
            debug!(backend, key = %key, error = %e, "warmup write failed");
        }
        if config.mode.reads() {
            if let Err(e) = store.get(&key) {
                debug!(backend, key = %key, error = %e, "warmup read failed");
            }
        }
    }
}

/// Drop sessions on the blocking pool. The postgres client owns a private
/// runtime, which must not be dropped on an async worker thread.
async fn close_sessions(sessions: Vec<Box<dyn Store>>) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(sessions)).await {
        warn!(error = %e, "closing sessions failed");
    }
}

fn join_error(worker: usize, e: JoinError) -> HarnessError {
    HarnessError::WorkerPanicked {
        worker,
        reason: e.to_string(),
    }
}
