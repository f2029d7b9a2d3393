//! Single timed operation
//!
//! The clock covers the adapter call and nothing else: keys and payloads are
//! built by the caller beforehand.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::OpKind;
use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(StoreError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(e) => Some(e),
        }
    }
}

/// One measured operation.
#[derive(Debug, Clone)]
pub struct Sample {
    pub backend: Arc<str>,
    pub op: OpKind,
    /// Position of the key in the run's key sequence.
    pub index: usize,
    pub key: String,
    pub worker: usize,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

impl Sample {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1_000.0
    }
}

/// The operation to perform, with everything it needs prepared up front.
#[derive(Debug, Clone, Copy)]
pub struct Operation<'a> {
    pub op: OpKind,
    pub index: usize,
    pub key: &'a str,
    /// Ignored for reads.
    pub payload: &'a [u8],
}

/// Where a sample came from.
#[derive(Debug, Clone)]
pub struct SampleOrigin {
    pub backend: Arc<str>,
    pub worker: usize,
}

/// Execute one put or get and time it. Never fails: adapter errors become
/// failed samples.
pub fn run_one(store: &mut dyn Store, origin: &SampleOrigin, operation: Operation<'_>) -> Sample {
    let start = Instant::now();
    let result = match operation.op {
        OpKind::Write => store.put(operation.key, operation.payload),
        OpKind::Read => store.get(operation.key).map(|_| ()),
    };
    let elapsed = start.elapsed();

    Sample {
        backend: Arc::clone(&origin.backend),
        op: operation.op,
        index: operation.index,
        key: operation.key.to_string(),
        worker: origin.worker,
        elapsed,
        outcome: match result {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failure(e),
        },
    }
}
