//! Latency statistics
//!
//! Computed once from a frozen [`ResultSet`]. Only successful samples enter
//! the latency figures; failures are counted separately.
//!
//! Percentiles use nearest rank on the ascending sorted latencies:
//! `index = ceil(p / 100 * n) - 1`, clamped to `[0, n - 1]`. Standard
//! deviation is the population form (divides by `n`).

use serde::Serialize;

use crate::harness::ResultSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub std_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    /// Successful samples, the population of `latency`.
    pub count: usize,
    pub failures: usize,
    pub total: usize,
    /// `None` when no operation succeeded.
    pub latency: Option<LatencySummary>,
}

impl SummaryStats {
    /// Failed share of all samples, 0.0..=1.0.
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failures as f64 / self.total as f64
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    let rank = (p * n as f64 / 100.0).ceil() as isize - 1;
    let index = rank.clamp(0, n as isize - 1) as usize;
    sorted[index]
}

/// Summary statistics over a set of latencies in milliseconds.
pub fn summarize_latencies(latencies_ms: &[f64]) -> Option<LatencySummary> {
    if latencies_ms.is_empty() {
        return None;
    }
    let mut sorted = latencies_ms.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    // Rounding in the sum can land the mean just outside the sample range.
    let mean = (sorted.iter().sum::<f64>() / n).clamp(min, max);
    let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    Some(LatencySummary {
        mean_ms: mean,
        p50_ms: percentile(&sorted, 50.0),
        p95_ms: percentile(&sorted, 95.0),
        p99_ms: percentile(&sorted, 99.0),
        std_ms: variance.sqrt(),
        min_ms: min,
        max_ms: max,
    })
}

pub fn summarize(results: &ResultSet) -> SummaryStats {
    let latencies: Vec<f64> = results
        .samples()
        .iter()
        .filter(|s| s.outcome.is_success())
        .map(|s| s.elapsed_ms())
        .collect();

    SummaryStats {
        count: latencies.len(),
        failures: results.len() - latencies.len(),
        total: results.len(),
        latency: summarize_latencies(&latencies),
    }
}
