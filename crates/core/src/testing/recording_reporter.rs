//! Error reporter that keeps what it was given.

use std::fmt::Display;
use std::sync::Mutex;

use crate::reporting::ErrorReporter;

/// Records `(stage, message)` pairs for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    captured: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> Vec<(String, String)> {
        self.captured.lock().unwrap().clone()
    }

    /// Number of errors captured for `stage`.
    pub fn captured_for(&self, stage: &str) -> usize {
        self.captured
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == stage)
            .count()
    }
}

impl ErrorReporter for RecordingReporter {
    fn capture(&self, stage: &str, error: &dyn Display) {
        self.captured
            .lock()
            .unwrap()
            .push((stage.to_string(), error.to_string()));
    }
}
