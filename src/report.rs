//! Report sink
//!
//! Raw samples go to the `--out` CSV, one row per sample. Per-phase summaries
//! go to a sibling `<stem>_summary.csv`, optionally to a JSON file, and to
//! the console. The summary can always be recomputed from the raw rows.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::config::{BenchmarkConfig, OpKind};
use crate::error::ReportError;
use crate::harness::{BackendOutcome, ResultSet};
use crate::stats::{summarize, SummaryStats};

pub const SAMPLE_HEADER: [&str; 9] = [
    "backend",
    "op",
    "payload_size",
    "index",
    "worker",
    "key",
    "latency_ms",
    "outcome",
    "error",
];

pub const SUMMARY_HEADER: [&str; 17] = [
    "backend",
    "op",
    "payload_size",
    "concurrency",
    "total",
    "successes",
    "failures",
    "failure_rate",
    "throughput_ops_sec",
    "mean_ms",
    "p50_ms",
    "p95_ms",
    "p99_ms",
    "std_ms",
    "min_ms",
    "max_ms",
    "status",
];

#[derive(Debug, Serialize)]
pub struct ResultMetadata {
    pub timestamp: String,
    pub version: String,
    pub ops: usize,
    pub payload_size: usize,
    pub concurrency: usize,
    pub mode: String,
}

/// Summary of one (backend, op) phase.
#[derive(Debug, Serialize)]
pub struct PhaseSummary {
    pub backend: String,
    pub op: OpKind,
    pub workers: usize,
    pub wall_secs: f64,
    pub throughput_ops_sec: f64,
    pub failure_rate: f64,
    pub stats: SummaryStats,
}

impl PhaseSummary {
    pub fn from_result(result: &ResultSet, workers: usize) -> Self {
        let stats = summarize(result);
        PhaseSummary {
            backend: result.backend().to_string(),
            op: result.op(),
            workers,
            wall_secs: result.wall().as_secs_f64(),
            throughput_ops_sec: result.throughput_ops_sec(),
            failure_rate: stats.failure_rate(),
            stats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SkippedBackend {
    pub backend: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    pub metadata: ResultMetadata,
    pub phases: Vec<PhaseSummary>,
    pub skipped: Vec<SkippedBackend>,
}

impl BenchmarkReport {
    pub fn new(config: &BenchmarkConfig, outcomes: &[BackendOutcome]) -> Self {
        let mut phases = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                BackendOutcome::Completed(run) => phases.extend(
                    run.results
                        .iter()
                        .map(|result| PhaseSummary::from_result(result, run.workers)),
                ),
                BackendOutcome::Skipped { backend, reason } => skipped.push(SkippedBackend {
                    backend: backend.clone(),
                    reason: reason.to_string(),
                }),
            }
        }

        BenchmarkReport {
            metadata: ResultMetadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ops: config.ops,
                payload_size: config.payload_size,
                concurrency: config.concurrency,
                mode: config.mode.as_str().to_string(),
            },
            phases,
            skipped,
        }
    }

    /// True when at least one backend produced results.
    pub fn any_completed(&self) -> bool {
        !self.phases.is_empty()
    }
}

/// `results/result.csv` -> `results/result_summary.csv`
pub fn summary_path(out: &Path) -> PathBuf {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result".to_string());
    out.with_file_name(format!("{}_summary.csv", stem))
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn fmt_ms(value: f64) -> String {
    format!("{:.6}", value)
}

/// One row per sample, raw samples of every completed backend and phase.
pub fn write_samples<W: io::Write>(
    writer: W,
    payload_size: usize,
    outcomes: &[BackendOutcome],
) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SAMPLE_HEADER)?;

    let results = outcomes.iter().filter_map(|o| match o {
        BackendOutcome::Completed(run) => Some(&run.results),
        BackendOutcome::Skipped { .. } => None,
    });
    for result in results.flatten() {
        for sample in result.samples() {
            let (outcome, error) = match sample.outcome.error() {
                None => ("success", String::new()),
                Some(e) => (e.kind(), e.to_string()),
            };
            wtr.write_record([
                sample.backend.to_string(),
                sample.op.to_string(),
                payload_size.to_string(),
                sample.index.to_string(),
                sample.worker.to_string(),
                sample.key.clone(),
                fmt_ms(sample.elapsed_ms()),
                outcome.to_string(),
                error,
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// One row per phase plus one row per skipped backend.
pub fn write_summary<W: io::Write>(
    writer: W,
    payload_size: usize,
    report: &BenchmarkReport,
) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SUMMARY_HEADER)?;

    for phase in &report.phases {
        let stats = &phase.stats;
        let latency: [String; 7] = match &stats.latency {
            Some(l) => [
                l.mean_ms, l.p50_ms, l.p95_ms, l.p99_ms, l.std_ms, l.min_ms, l.max_ms,
            ]
            .map(fmt_ms),
            None => Default::default(),
        };
        let mut record = vec![
            phase.backend.clone(),
            phase.op.to_string(),
            payload_size.to_string(),
            phase.workers.to_string(),
            stats.total.to_string(),
            stats.count.to_string(),
            stats.failures.to_string(),
            format!("{:.4}", phase.failure_rate),
            format!("{:.2}", phase.throughput_ops_sec),
        ];
        record.extend(latency);
        record.push("completed".to_string());
        wtr.write_record(&record)?;
    }

    for skipped in &report.skipped {
        let mut record = vec![skipped.backend.clone()];
        record.extend(std::iter::repeat(String::new()).take(SUMMARY_HEADER.len() - 2));
        record.push(format!("skipped: {}", skipped.reason));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the raw CSV, summary CSV and (if configured) JSON summary.
pub fn export(
    config: &BenchmarkConfig,
    outcomes: &[BackendOutcome],
    report: &BenchmarkReport,
) -> Result<(), ReportError> {
    create_parent(&config.out)?;
    write_samples(fs::File::create(&config.out)?, config.payload_size, outcomes)?;

    let summary = summary_path(&config.out);
    write_summary(fs::File::create(&summary)?, config.payload_size, report)?;

    if let Some(path) = &config.summary_json {
        create_parent(path)?;
        fs::write(path, serde_json::to_string_pretty(report)?)?;
    }
    Ok(())
}

/// Print results to console
pub fn print_summary(report: &BenchmarkReport) {
    let meta = &report.metadata;
    println!(
        "\n=== Benchmark Results (ops={}, payload={}B, mode={}, concurrency={}) ===",
        meta.ops, meta.payload_size, meta.mode, meta.concurrency
    );
    println!(
        "{:<10} {:<6} {:>7} {:>8} {:>12} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "backend",
        "op",
        "count",
        "failed",
        "ops/sec",
        "mean ms",
        "p50 ms",
        "p95 ms",
        "p99 ms",
        "std ms"
    );
    for phase in &report.phases {
        let stats = &phase.stats;
        let cells = match &stats.latency {
            Some(l) => {
                [l.mean_ms, l.p50_ms, l.p95_ms, l.p99_ms, l.std_ms].map(|v| format!("{:.3}", v))
            }
            None => ["-", "-", "-", "-", "-"].map(String::from),
        };
        println!(
            "{:<10} {:<6} {:>7} {:>8} {:>12.0} {:>10} {:>10} {:>10} {:>10} {:>10}",
            phase.backend,
            phase.op.as_str(),
            stats.count,
            format!("{} ({:.1}%)", stats.failures, phase.failure_rate * 100.0),
            phase.throughput_ops_sec,
            cells[0],
            cells[1],
            cells[2],
            cells[3],
            cells[4],
        );
    }
    for skipped in &report.skipped {
        println!("{:<10} skipped: {}", skipped.backend, skipped.reason);
    }
}
