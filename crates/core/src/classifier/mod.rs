//! Keyword classification.
//!
//! A [`Classifier`] maps a keyword to a single lowercase topic label. The
//! LLM-backed implementation accepts answers in the vocabulary below and
//! falls back to whatever single topic the model proposes otherwise.

mod config;
mod llm;

pub use config::*;
pub use llm::*;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

/// Topics the classifier prompt steers towards.
pub const TOPIC_VOCABULARY: &[&str] = &[
    "travel",
    "food",
    "exploration",
    "culture",
    "motivation",
    "mindfulness",
    "psychology",
    "leadership",
    "selfhelp",
    "life experiences",
    "personal growth",
];

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("no classification received for {0:?}")]
    Empty(String),
}

/// Maps a keyword to a topic label.
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Return a trimmed, lowercase topic label.
    async fn classify(&self, keyword: &str) -> Result<String, ClassifyError>;
}

static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Clean a raw model answer into a topic label.
///
/// Drops `<think>` reasoning blocks, trims, lowercases and reduces an
/// `others: <topic>` answer to `<topic>`. Returns `None` when nothing is left.
pub fn normalize_topic(raw: &str) -> Option<String> {
    let cleaned = THINK_BLOCK.replace_all(raw, "");
    let mut topic = cleaned.trim().to_lowercase();

    if let Some(rest) = topic.strip_prefix("others:") {
        topic = rest.trim().to_string();
    }

    let topic = topic
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c.is_whitespace())
        .to_string();

    if topic.is_empty() {
        None
    } else {
        Some(topic)
    }
}

fn system_prompt() -> String {
    format!(
        "Classify the keyword into one of these topics: {}. If it doesn't match any topic, \
         provide a specific single-word topic name. Respond with only the topic name, nothing else.",
        TOPIC_VOCABULARY.join(", ")
    )
}

/// Classifier backed by any [`LlmClient`].
pub struct LlmClassifier {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &str {
        self.client.provider()
    }

    async fn classify(&self, keyword: &str) -> Result<String, ClassifyError> {
        let request = CompletionRequest::new(keyword)
            .with_system(system_prompt())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let response = self.client.complete(request).await?;
        normalize_topic(&response.text).ok_or_else(|| ClassifyError::Empty(keyword.to_string()))
    }
}

/// Factory function to create a classifier from config
pub fn create_classifier(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>, LlmError> {
    let timeout = Duration::from_secs(u64::from(config.timeout_secs));

    let client: Arc<dyn LlmClient> = match config.provider {
        ClassifierProvider::Ollama => Arc::new(
            OllamaClient::new(config.model.clone())
                .with_api_base(config.api_base())
                .with_timeout(timeout),
        ),
        ClassifierProvider::OpenAi | ClassifierProvider::OpenRouter => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                LlmError::NotConfigured(format!(
                    "api_key must be set for provider {}",
                    config.provider.as_str()
                ))
            })?;
            let provider = match config.provider {
                ClassifierProvider::OpenRouter => "openrouter",
                _ => "openai",
            };
            Arc::new(
                OpenAiClient::new(api_key, config.model.clone())
                    .with_provider(provider, config.api_base())
                    .with_timeout(timeout),
            )
        }
    };

    Ok(Arc::new(
        LlmClassifier::new(client).with_max_tokens(config.max_tokens),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedLlm {
        answer: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        fn provider(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned-1"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            Ok(CompletionResponse {
                text: self.answer.clone(),
                usage: LlmUsage::default(),
                model: "canned-1".to_string(),
            })
        }
    }

    fn canned(answer: &str) -> Arc<CannedLlm> {
        Arc::new(CannedLlm {
            answer: answer.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_normalize_strips_reasoning() {
        let raw = "<think>\nThe keyword is about trips.\n</think>\n\nTravel\n";
        assert_eq!(normalize_topic(raw).as_deref(), Some("travel"));
    }

    #[test]
    fn test_normalize_others_prefix() {
        assert_eq!(normalize_topic("Others: Gardening").as_deref(), Some("gardening"));
        assert_eq!(normalize_topic("  Food. ").as_deref(), Some("food"));
        assert_eq!(
            normalize_topic("Personal Growth").as_deref(),
            Some("personal growth")
        );
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_topic("<think>only thoughts</think>").is_none());
        assert!(normalize_topic("   ").is_none());
    }

    #[tokio::test]
    async fn test_llm_classifier_prompts_with_vocabulary() {
        let llm = canned("<think>x</think> Culture");
        let classifier = LlmClassifier::new(llm.clone()).with_max_tokens(20);

        let topic = classifier.classify("kyoto tea ceremony").await.unwrap();
        assert_eq!(topic, "culture");
        assert_eq!(classifier.name(), "canned");

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, "kyoto tea ceremony");
        assert_eq!(seen[0].max_tokens, 20);
        let system = seen[0].system.as_deref().unwrap();
        assert!(system.contains("life experiences"));
    }

    #[tokio::test]
    async fn test_llm_classifier_empty_answer_fails() {
        let classifier = LlmClassifier::new(canned(""));
        let err = classifier.classify("anything").await.unwrap_err();
        assert!(matches!(err, ClassifyError::Empty(_)));
    }

    #[test]
    fn test_create_classifier_per_provider() {
        let ollama = create_classifier(&ClassifierConfig::default()).unwrap();
        assert_eq!(ollama.name(), "ollama");

        let router = create_classifier(&ClassifierConfig {
            provider: ClassifierProvider::OpenRouter,
            api_key: Some("sk".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(router.name(), "openrouter");

        let missing_key = create_classifier(&ClassifierConfig {
            provider: ClassifierProvider::OpenAi,
            ..Default::default()
        });
        assert!(matches!(missing_key, Err(LlmError::NotConfigured(_))));
    }
}
