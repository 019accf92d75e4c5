//! Mock script backend for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::script_service::{GeneratedScript, KeywordQuestion, ScriptError, ScriptService};

/// Mock implementation of the ScriptService trait.
///
/// Related topics and questions come from tables set by the test. Scripts
/// are synthesized from the keyword with a configurable tag string.
pub struct MockScriptService {
    related: Mutex<HashMap<String, Vec<String>>>,
    questions: Mutex<HashMap<String, Vec<KeywordQuestion>>>,
    invalid: Mutex<HashSet<String>>,
    tags: Mutex<String>,
    generated_for: Mutex<Vec<String>>,
    fail_scripts: AtomicBool,
    fail_questions: AtomicBool,
    related_calls: AtomicUsize,
}

impl Default for MockScriptService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScriptService {
    pub fn new() -> Self {
        Self {
            related: Mutex::new(HashMap::new()),
            questions: Mutex::new(HashMap::new()),
            invalid: Mutex::new(HashSet::new()),
            tags: Mutex::new("travel,tips,guide".to_string()),
            generated_for: Mutex::new(Vec::new()),
            fail_scripts: AtomicBool::new(false),
            fail_questions: AtomicBool::new(false),
            related_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_related(&self, topic: &str, related: &[&str]) {
        self.related.lock().unwrap().insert(
            topic.to_string(),
            related.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn set_questions(&self, topic: &str, keywords: &[&str]) {
        self.questions.lock().unwrap().insert(
            topic.to_string(),
            keywords.iter().map(|k| KeywordQuestion::new(*k)).collect(),
        );
    }

    /// Tag string put on every generated script.
    pub fn set_tags(&self, tags: &str) {
        *self.tags.lock().unwrap() = tags.to_string();
    }

    /// Reject `keyword` with the invalid-keyword error.
    pub fn mark_invalid(&self, keyword: &str) {
        self.invalid.lock().unwrap().insert(keyword.to_string());
    }

    pub fn fail_scripts(&self, fail: bool) {
        self.fail_scripts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_questions(&self, fail: bool) {
        self.fail_questions.store(fail, Ordering::SeqCst);
    }

    /// Keywords a script was successfully generated for, in call order.
    pub fn generated_for(&self) -> Vec<String> {
        self.generated_for.lock().unwrap().clone()
    }

    pub fn related_calls(&self) -> usize {
        self.related_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptService for MockScriptService {
    async fn generate_script(&self, keyword: &str) -> Result<GeneratedScript, ScriptError> {
        if self.invalid.lock().unwrap().contains(keyword) {
            return Err(ScriptError::InvalidKeyword(format!(
                "cannot write about {:?}",
                keyword
            )));
        }
        if self.fail_scripts.load(Ordering::SeqCst) {
            return Err(ScriptError::Api {
                status: 503,
                message: "mock script failure".to_string(),
            });
        }

        self.generated_for
            .lock()
            .unwrap()
            .push(keyword.to_string());

        Ok(GeneratedScript {
            title: format!("Title: {}", keyword),
            description: format!("All about {}", keyword),
            thumbnail: format!("{} thumbnail", keyword),
            tags: self.tags.lock().unwrap().clone(),
            script: format!("Today we talk about {}.", keyword),
        })
    }

    async fn related_keywords(&self, topic: &str) -> Result<Vec<String>, ScriptError> {
        self.related_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .related
            .lock()
            .unwrap()
            .get(topic)
            .cloned()
            .unwrap_or_default())
    }

    async fn questions(&self, topic: &str) -> Result<Vec<KeywordQuestion>, ScriptError> {
        if self.fail_questions.load(Ordering::SeqCst) {
            return Err(ScriptError::ConnectionFailed(
                "mock questions failure".to_string(),
            ));
        }
        Ok(self
            .questions
            .lock()
            .unwrap()
            .get(topic)
            .cloned()
            .unwrap_or_default())
    }
}
