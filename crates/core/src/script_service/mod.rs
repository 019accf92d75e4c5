//! Script backend: script generation and keyword expansion.

mod http;

pub use http::HttpScriptService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::Script;

/// Error code the backend uses for keywords that can never produce a script.
pub const INVALID_KEYWORD_CODE: &str = "ValueError";

#[derive(Debug, Error)]
pub enum ScriptError {
    /// The keyword itself is unusable. Retrying will not help.
    #[error("invalid keyword: {0}")]
    InvalidKeyword(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("script service error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ScriptError {
    pub fn is_invalid_keyword(&self) -> bool {
        matches!(self, ScriptError::InvalidKeyword(_))
    }
}

/// Script returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub thumbnail: String,
    /// Comma-separated tags.
    #[serde(default)]
    pub tags: String,
    /// Narration body.
    #[serde(default)]
    pub script: String,
}

impl GeneratedScript {
    pub fn into_script(self, keyword: &str) -> Script {
        Script {
            title: self.title,
            description: self.description,
            thumbnail: self.thumbnail,
            tags: self.tags,
            keyword: keyword.to_string(),
            body: self.script,
        }
    }
}

/// A question-style keyword with its search metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordQuestion {
    pub keyword: String,
    #[serde(default)]
    pub competition: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub overall: f64,
    #[serde(default)]
    pub estimated_monthly_search: f64,
}

impl KeywordQuestion {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            competition: 0.0,
            volume: 0.0,
            overall: 0.0,
            estimated_monthly_search: 0.0,
        }
    }
}

/// Script and keyword-research backend.
#[async_trait]
pub trait ScriptService: Send + Sync {
    /// Generate a script for a keyword.
    async fn generate_script(&self, keyword: &str) -> Result<GeneratedScript, ScriptError>;

    /// Topics related to a seed topic.
    async fn related_keywords(&self, topic: &str) -> Result<Vec<String>, ScriptError>;

    /// Question keywords people search for around a topic.
    async fn questions(&self, topic: &str) -> Result<Vec<KeywordQuestion>, ScriptError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_script_into_script() {
        let generated = GeneratedScript {
            title: "10 Hidden Beaches".to_string(),
            description: "desc".to_string(),
            thumbnail: "beach at dusk".to_string(),
            tags: "beach,travel".to_string(),
            script: "Welcome back".to_string(),
        };
        let script = generated.into_script("hidden beaches");
        assert_eq!(script.keyword, "hidden beaches");
        assert_eq!(script.body, "Welcome back");
        assert_eq!(script.tag_list(), vec!["beach", "travel"]);
    }

    #[test]
    fn test_question_defaults_missing_metrics() {
        let question: KeywordQuestion =
            serde_json::from_str(r#"{"keyword": "is bali safe", "volume": 1200}"#).unwrap();
        assert_eq!(question.keyword, "is bali safe");
        assert_eq!(question.volume, 1200.0);
        assert_eq!(question.competition, 0.0);
    }
}
