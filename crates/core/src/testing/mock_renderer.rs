//! Mock rendering backend for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::render::{RenderError, RenderRequest, TaskStatus, VideoRenderer};

/// Mock implementation of the VideoRenderer trait.
///
/// Submitted tasks get ids `task-1`, `task-2`, ... Each poll of a task pops
/// the next value of its progress sequence; the last value repeats forever.
///
/// # Example
///
/// ```rust,ignore
/// let renderer = MockVideoRenderer::new();
/// renderer.set_progress_sequence("task-1", vec![10.0, 40.0]); // stuck at 40
/// renderer.fail_next_polls(2);
/// ```
pub struct MockVideoRenderer {
    submitted: Mutex<Vec<RenderRequest>>,
    sequences: Mutex<HashMap<String, VecDeque<f64>>>,
    default_sequence: Mutex<Vec<f64>>,
    polls: Mutex<HashMap<String, usize>>,
    deleted: Mutex<Vec<String>>,
    failing_polls: AtomicUsize,
    failing_submits: AtomicUsize,
    counter: AtomicUsize,
}

impl Default for MockVideoRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVideoRenderer {
    pub fn new() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            sequences: Mutex::new(HashMap::new()),
            default_sequence: Mutex::new(vec![100.0]),
            polls: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
            failing_polls: AtomicUsize::new(0),
            failing_submits: AtomicUsize::new(0),
            counter: AtomicUsize::new(0),
        }
    }

    /// Progress values reported for `task_id`, in order.
    pub fn set_progress_sequence(&self, task_id: &str, progress: Vec<f64>) {
        self.sequences
            .lock()
            .unwrap()
            .insert(task_id.to_string(), progress.into());
    }

    /// Sequence used by tasks without an explicit one. Defaults to `[100.0]`.
    pub fn set_default_sequence(&self, progress: Vec<f64>) {
        *self.default_sequence.lock().unwrap() = progress;
    }

    /// Fail the next `n` status polls with a connection error.
    pub fn fail_next_polls(&self, n: usize) {
        self.failing_polls.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` submissions with a connection error.
    pub fn fail_next_submits(&self, n: usize) {
        self.failing_submits.store(n, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<RenderRequest> {
        self.submitted.lock().unwrap().clone()
    }

    /// Status polls made for `task_id`, failed ones included.
    pub fn poll_count(&self, task_id: &str) -> usize {
        self.polls
            .lock()
            .unwrap()
            .get(task_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn deleted_tasks(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl VideoRenderer for MockVideoRenderer {
    async fn submit(&self, request: &RenderRequest) -> Result<String, RenderError> {
        if Self::take_failure(&self.failing_submits) {
            return Err(RenderError::ConnectionFailed(
                "mock submit failure".to_string(),
            ));
        }

        self.submitted.lock().unwrap().push(request.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("task-{}", n))
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskStatus, RenderError> {
        *self
            .polls
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_insert(0) += 1;

        if Self::take_failure(&self.failing_polls) {
            return Err(RenderError::ConnectionFailed(
                "mock poll failure".to_string(),
            ));
        }

        let mut sequences = self.sequences.lock().unwrap();
        let sequence = sequences
            .entry(task_id.to_string())
            .or_insert_with(|| self.default_sequence.lock().unwrap().clone().into());
        let progress = if sequence.len() > 1 {
            sequence.pop_front().unwrap_or(100.0)
        } else {
            sequence.front().copied().unwrap_or(100.0)
        };

        Ok(TaskStatus {
            progress,
            state: None,
        })
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), RenderError> {
        self.deleted.lock().unwrap().push(task_id.to_string());
        Ok(())
    }
}
