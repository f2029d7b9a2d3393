//! kvbench - point read/write latency benchmark for SQLite, Postgres and Redis
//!
//! # Example
//!
//! ```no_run
//! use kvbench::{BackendSelector, BenchmarkConfig, LoadHarness, Mode};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = BenchmarkConfig {
//!     backends: BackendSelector::Sqlite,
//!     ops: 100,
//!     payload_size: 64,
//!     mode: Mode::Both,
//!     ..Default::default()
//! }
//! .validate()?;
//!
//! let backends = kvbench::store::backends_for(&config);
//! let harness = LoadHarness::new(config);
//! let outcomes = harness.run_all(backends).await?;
//! let report = kvbench::BenchmarkReport::new(harness.config(), &outcomes);
//! kvbench::report::print_summary(&report);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod harness;
pub mod payload;
pub mod report;
pub mod runner;
pub mod stats;
pub mod store;

pub use config::{BackendKind, BackendSelector, BenchmarkConfig, ConnectionSettings, Mode, OpKind};
pub use error::{ConfigError, HarnessError, ReportError, SetupError, StoreError};
pub use harness::{BackendOutcome, BackendRun, LoadHarness, ResultCollector, ResultSet};
pub use payload::PayloadGenerator;
pub use report::BenchmarkReport;
pub use runner::{run_one, Outcome, Sample};
pub use stats::{summarize, LatencySummary, SummaryStats};
pub use store::{Backend, Store};
