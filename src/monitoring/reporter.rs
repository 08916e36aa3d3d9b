//! Error reporters

use super::ErrorReporter;
use crate::error::EngineError;
use parking_lot::Mutex;

/// Logs every reported failure through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn handle_error(&self, error: &EngineError, context: &str) {
        match error {
            // Cancellation is requested by the caller, not a fault
            EngineError::Cancelled => tracing::info!(context, kind = error.kind(), "operation cancelled"),
            _ => tracing::error!(context, kind = error.kind(), error = %error, "engine call failed"),
        }
    }
}

/// Keeps `(context, kind)` pairs in memory; useful for tests and embedding
#[derive(Debug, Default)]
pub struct RecordingErrorReporter {
    records: Mutex<Vec<(String, &'static str)>>,
}

impl RecordingErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, &'static str)> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorReporter for RecordingErrorReporter {
    fn handle_error(&self, error: &EngineError, context: &str) {
        self.records.lock().push((context.to_string(), error.kind()));
    }
}
