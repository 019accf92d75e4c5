//! Classifier configuration types.

use serde::{Deserialize, Serialize};

/// LLM provider used for keyword classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierProvider {
    /// Local Ollama instance.
    #[default]
    Ollama,
    /// OpenAI chat completions.
    OpenAi,
    /// OpenRouter (OpenAI-compatible, hosts DeepSeek and friends).
    OpenRouter,
}

impl ClassifierProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierProvider::Ollama => "ollama",
            ClassifierProvider::OpenAi => "open_ai",
            ClassifierProvider::OpenRouter => "open_router",
        }
    }

    /// Hosted providers refuse anonymous requests.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ClassifierProvider::Ollama)
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            ClassifierProvider::Ollama => "http://localhost:11434",
            ClassifierProvider::OpenAi => "https://api.openai.com/v1",
            ClassifierProvider::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

/// Keyword classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub provider: ClassifierProvider,
    /// Model name/identifier.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL (for proxies or self-hosted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Maximum tokens for completions.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "deepseek-r1:14b".to_string()
}

fn default_timeout() -> u32 {
    60
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::default(),
            model: default_model(),
            api_key: None,
            api_base: None,
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ClassifierConfig {
    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_base())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("classifier.model cannot be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("classifier.timeout_secs must be greater than 0".to_string());
        }
        if self.provider.requires_api_key()
            && self.api_key.as_deref().map_or(true, |k| k.is_empty())
        {
            return Err(format!(
                "classifier.api_key is required for provider {}",
                self.provider.as_str()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_local_ollama() {
        let config = ClassifierConfig::default();
        assert_eq!(config.provider, ClassifierProvider::Ollama);
        assert_eq!(config.api_base(), "http://localhost:11434");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_open_router() {
        let toml = r#"
            provider = "open_router"
            model = "deepseek/deepseek-r1"
            api_key = "sk-test"
        "#;
        let config: ClassifierConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.provider, ClassifierProvider::OpenRouter);
        assert_eq!(config.api_base(), "https://openrouter.ai/api/v1");
        assert_eq!(config.max_tokens, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hosted_provider_requires_key() {
        let config = ClassifierConfig {
            provider: ClassifierProvider::OpenAi,
            model: "gpt-4".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("api_key"));
    }

    #[test]
    fn test_custom_api_base_wins() {
        let config = ClassifierConfig {
            api_base: Some("http://gpu-box:11434".to_string()),
            ..Default::default()
        };
        assert_eq!(config.api_base(), "http://gpu-box:11434");
    }
}
