use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ScriptServiceConfig;

use super::{GeneratedScript, KeywordQuestion, ScriptError, ScriptService, INVALID_KEYWORD_CODE};

/// HTTP client for the script backend.
pub struct HttpScriptService {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    keyword: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpScriptService {
    pub fn new(config: &ScriptServiceConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(u64::from(config.timeout_secs)),
        }
    }

    fn topic_url(&self, path: &str, topic: &str) -> String {
        format!(
            "{}/{}?topic={}",
            self.base_url,
            path,
            urlencoding::encode(topic)
        )
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ScriptError> {
        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ScriptError::Timeout
            } else {
                ScriptError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &text));
        }

        response
            .json()
            .await
            .map_err(|e| ScriptError::Parse(e.to_string()))
    }
}

/// Map a failed response body onto [`ScriptError`].
fn classify_error(status: u16, body: &str) -> ScriptError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            code: Some(code),
            message,
        }) if code == INVALID_KEYWORD_CODE => {
            ScriptError::InvalidKeyword(message.unwrap_or(code))
        }
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => ScriptError::Api { status, message },
        _ => ScriptError::Api {
            status,
            message: body.chars().take(200).collect(),
        },
    }
}

#[async_trait]
impl ScriptService for HttpScriptService {
    async fn generate_script(&self, keyword: &str) -> Result<GeneratedScript, ScriptError> {
        debug!(keyword, "Requesting script");
        let request = self
            .client
            .post(format!("{}/generate-video", self.base_url))
            .json(&GenerateRequest { keyword });
        self.send(request).await
    }

    async fn related_keywords(&self, topic: &str) -> Result<Vec<String>, ScriptError> {
        debug!(topic, "Requesting related keywords");
        let request = self.client.get(self.topic_url("related-keywords", topic));
        self.send(request).await
    }

    async fn questions(&self, topic: &str) -> Result<Vec<KeywordQuestion>, ScriptError> {
        debug!(topic, "Requesting questions");
        let request = self.client.get(self.topic_url("questions", topic));
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_error_is_invalid_keyword() {
        let err = classify_error(
            400,
            r#"{"code": "ValueError", "message": "keyword too short"}"#,
        );
        assert!(matches!(err, ScriptError::InvalidKeyword(ref m) if m == "keyword too short"));
        assert!(err.is_invalid_keyword());
    }

    #[test]
    fn test_other_codes_are_recoverable() {
        let err = classify_error(500, r#"{"code": "RateLimit", "message": "slow down"}"#);
        assert!(matches!(err, ScriptError::Api { status: 500, ref message } if message == "slow down"));
        assert!(!err.is_invalid_keyword());

        let err = classify_error(502, "<html>bad gateway</html>");
        assert!(matches!(err, ScriptError::Api { status: 502, .. }));
    }

    #[test]
    fn test_topic_url_is_encoded() {
        let service = HttpScriptService::new(&ScriptServiceConfig {
            url: "http://scripts:8081/api/v1/".to_string(),
            timeout_secs: 5,
        });
        assert_eq!(
            service.topic_url("questions", "life experiences"),
            "http://scripts:8081/api/v1/questions?topic=life%20experiences"
        );
    }
}
