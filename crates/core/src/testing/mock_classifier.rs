//! Mock classifier for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::classifier::{ClassifyError, Classifier, LlmError};

/// Classifier answering from a lookup table.
///
/// Keywords without an explicit answer get the default topic.
pub struct MockClassifier {
    default_topic: String,
    topics: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn new(default_topic: impl Into<String>) -> Self {
        Self {
            default_topic: default_topic.into(),
            topics: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_topic(&self, keyword: &str, topic: &str) {
        self.topics
            .lock()
            .unwrap()
            .insert(keyword.to_string(), topic.to_string());
    }

    /// Make classification of `keyword` fail.
    pub fn fail_on(&self, keyword: &str) {
        self.failing.lock().unwrap().insert(keyword.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Number of classify calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn classify(&self, keyword: &str) -> Result<String, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(keyword) {
            return Err(ClassifyError::Llm(LlmError::Http(
                "mock classifier failure".to_string(),
            )));
        }

        Ok(self
            .topics
            .lock()
            .unwrap()
            .get(keyword)
            .cloned()
            .unwrap_or_else(|| self.default_topic.clone()))
    }
}
