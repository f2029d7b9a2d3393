use thiserror::Error;

/// Failure of a single put/get. Recorded in the sample, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Short machine-readable tag used in exported rows.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound => "not_found",
            StoreError::ConnectionFailed(_) => "connection_failed",
            StoreError::Timeout(_) => "timeout",
            StoreError::Backend(_) => "backend",
        }
    }
}

/// A backend could not be prepared or a session could not be opened.
/// Fatal for that backend only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("{backend}: cannot connect: {reason}")]
    Connect { backend: String, reason: String },

    #[error("{backend}: schema setup failed: {reason}")]
    Schema { backend: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--ops must be a positive integer")]
    ZeroOps,

    #[error("--concurrency must be a positive integer")]
    ZeroConcurrency,

    #[error("--deadline-secs must be greater than zero")]
    ZeroDeadline,

    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("worker {worker} panicked: {reason}")]
    WorkerPanicked { worker: usize, reason: String },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
