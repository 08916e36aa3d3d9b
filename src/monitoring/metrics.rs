//! Call latency metrics
//!
//! Keeps a rolling window of elapsed times per metric name. All mutable
//! state sits behind one lock; the call counter is a lock-free atomic.

use super::MetricsSink;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Default number of observations kept per metric
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

#[derive(Debug, Default)]
struct MetricWindow {
    samples: VecDeque<f64>,
    /// Observations ever recorded, including those rolled out of the window
    count: u64,
}

/// Rolling latency window keyed by metric name
#[derive(Debug)]
pub struct PerformanceMetrics {
    window_size: usize,
    windows: RwLock<HashMap<String, MetricWindow>>,
    total_calls: AtomicU64,
    start_time: Instant,
}

impl PerformanceMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            windows: RwLock::new(HashMap::new()),
            total_calls: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one observation in seconds
    pub fn record(&self, name: &str, elapsed_secs: f64) {
        {
            let mut windows = self.windows.write();
            let window = windows.entry(name.to_string()).or_default();
            window.samples.push_back(elapsed_secs);
            if window.samples.len() > self.window_size {
                window.samples.pop_front();
            }
            window.count += 1;
        }
        self.total_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Observations ever recorded under `name`
    pub fn count(&self, name: &str) -> u64 {
        self.windows.read().get(name).map_or(0, |w| w.count)
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Metric names seen so far, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.windows.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Mean over the current window, 0 when nothing was recorded
    pub fn mean(&self, name: &str) -> f64 {
        self.windows
            .read()
            .get(name)
            .filter(|w| !w.samples.is_empty())
            .map_or(0.0, |w| w.samples.iter().sum::<f64>() / w.samples.len() as f64)
    }

    /// Nearest-rank percentile over the current window.
    /// Uses quickselect instead of a full sort.
    pub fn percentile(&self, name: &str, percentile: f64) -> f64 {
        let windows = self.windows.read();
        let Some(window) = windows.get(name).filter(|w| !w.samples.is_empty()) else {
            return 0.0;
        };

        let mut data: Vec<f64> = window.samples.iter().copied().collect();
        let idx = ((percentile.clamp(0.0, 100.0) / 100.0) * (data.len() - 1) as f64) as usize;
        let idx = idx.min(data.len() - 1);
        data.select_nth_unstable_by(idx, |a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        data[idx]
    }

    /// Summary for one metric
    pub fn summary(&self, name: &str) -> MetricSummary {
        let (count, window_len, min, max) = {
            let windows = self.windows.read();
            match windows.get(name) {
                Some(w) if !w.samples.is_empty() => (
                    w.count,
                    w.samples.len(),
                    w.samples.iter().copied().fold(f64::INFINITY, f64::min),
                    w.samples.iter().copied().fold(0.0, f64::max),
                ),
                Some(w) => (w.count, 0, 0.0, 0.0),
                None => (0, 0, 0.0, 0.0),
            }
        };

        MetricSummary {
            name: name.to_string(),
            count,
            window_len,
            mean_secs: self.mean(name),
            min_secs: min,
            max_secs: max,
            p50_secs: self.percentile(name, 50.0),
            p95_secs: self.percentile(name, 95.0),
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn reset(&self) {
        self.windows.write().clear();
        self.total_calls.store(0, Ordering::Relaxed);
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl MetricsSink for PerformanceMetrics {
    fn record_metric(&self, name: &str, elapsed_secs: f64) {
        self.record(name, elapsed_secs);
    }
}

/// Snapshot of one metric's window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub count: u64,
    pub window_len: usize,
    pub mean_secs: f64,
    pub min_secs: f64,
    pub max_secs: f64,
    pub p50_secs: f64,
    pub p95_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = PerformanceMetrics::new(100);

        metrics.record("train_model", 0.1);
        metrics.record("train_model", 0.2);
        metrics.record("train_model", 0.3);
        metrics.record("predict", 0.01);

        assert_eq!(metrics.total_calls(), 4);
        assert_eq!(metrics.count("train_model"), 3);
        assert!((metrics.mean("train_model") - 0.2).abs() < 1e-12);
        assert_eq!(metrics.names(), vec!["predict".to_string(), "train_model".to_string()]);
    }

    #[test]
    fn test_percentiles() {
        let metrics = PerformanceMetrics::new(100);
        for i in 1..=100 {
            metrics.record("cluster", i as f64);
        }

        assert!((metrics.percentile("cluster", 50.0) - 50.0).abs() < 1.0);
        assert!((metrics.percentile("cluster", 95.0) - 95.0).abs() < 1.0);
        assert_eq!(metrics.percentile("missing", 50.0), 0.0);
    }

    #[test]
    fn test_window_rolls_but_count_does_not() {
        let metrics = PerformanceMetrics::new(2);
        metrics.record("predict", 1.0);
        metrics.record("predict", 3.0);
        metrics.record("predict", 5.0);

        let summary = metrics.summary("predict");
        assert_eq!(summary.count, 3);
        assert_eq!(summary.window_len, 2);
        assert_eq!(summary.min_secs, 3.0);
        assert_eq!(summary.max_secs, 5.0);
        assert_eq!(summary.mean_secs, 4.0);
    }

    #[test]
    fn test_reset() {
        let metrics = PerformanceMetrics::default();
        metrics.record_metric("predict", 0.5);
        metrics.reset();
        assert_eq!(metrics.total_calls(), 0);
        assert!(metrics.names().is_empty());
    }
}
