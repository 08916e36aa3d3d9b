//! Monitoring Module
//!
//! Collaborator traits the engine reports to, plus default implementations.

mod metrics;
mod reporter;

use crate::error::EngineError;

pub use metrics::{MetricSummary, PerformanceMetrics, DEFAULT_WINDOW_SIZE};
pub use reporter::{RecordingErrorReporter, TracingErrorReporter};

/// Receives one elapsed-time observation per public engine call
pub trait MetricsSink: Send + Sync {
    fn record_metric(&self, name: &str, elapsed_secs: f64);
}

/// Receives every failure before it is returned to the caller
pub trait ErrorReporter: Send + Sync {
    fn handle_error(&self, error: &EngineError, context: &str);
}
