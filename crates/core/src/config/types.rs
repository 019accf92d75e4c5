use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::classifier::{ClassifierConfig, ClassifierProvider};
use crate::pipeline::{PipelineConfig, ScheduleConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub script_service: ScriptServiceConfig,
    #[serde(default)]
    pub render_service: RenderServiceConfig,
    #[serde(default)]
    pub upload_service: UploadServiceConfig,
    #[serde(default)]
    pub error_tracking: ErrorTrackingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Status API listener
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    9090
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("autotube.db")
}

/// Script backend (scripts, related keywords, questions)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScriptServiceConfig {
    #[serde(default = "default_script_url")]
    pub url: String,
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u32,
}

impl Default for ScriptServiceConfig {
    fn default() -> Self {
        Self {
            url: default_script_url(),
            timeout_secs: default_service_timeout(),
        }
    }
}

fn default_script_url() -> String {
    "http://localhost:8081/api/v1".to_string()
}

fn default_service_timeout() -> u32 {
    120
}

/// Video rendering backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderServiceConfig {
    #[serde(default = "default_render_url")]
    pub url: String,
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u32,
    /// Directory where the renderer writes `<task_id>/final-1.mp4`.
    #[serde(default = "default_video_task_dir")]
    pub video_task_dir: PathBuf,
}

impl Default for RenderServiceConfig {
    fn default() -> Self {
        Self {
            url: default_render_url(),
            timeout_secs: default_render_timeout(),
            video_task_dir: default_video_task_dir(),
        }
    }
}

fn default_render_url() -> String {
    "http://127.0.0.1:8080/api/v1".to_string()
}

fn default_render_timeout() -> u32 {
    30
}

fn default_video_task_dir() -> PathBuf {
    PathBuf::from("storage/tasks")
}

/// Upload microservice
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadServiceConfig {
    #[serde(default = "default_upload_url")]
    pub url: String,
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u32,
}

impl Default for UploadServiceConfig {
    fn default() -> Self {
        Self {
            url: default_upload_url(),
            timeout_secs: default_upload_timeout(),
        }
    }
}

fn default_upload_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_upload_timeout() -> u32 {
    300
}

/// External error tracking
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorTrackingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ErrorTrackingConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: default_environment(),
        }
    }
}

fn default_environment() -> String {
    "production".to_string()
}

/// Log output
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub classifier: SanitizedClassifierConfig,
    pub script_service: ScriptServiceConfig,
    pub render_service: RenderServiceConfig,
    pub upload_service: UploadServiceConfig,
    pub error_tracking: SanitizedErrorTrackingConfig,
    pub pipeline: PipelineConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

/// Classifier config with the API key hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedClassifierConfig {
    pub provider: ClassifierProvider,
    pub model: String,
    pub api_base: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub max_tokens: u32,
}

/// Error tracking config with the DSN hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedErrorTrackingConfig {
    pub dsn_configured: bool,
    pub environment: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            classifier: SanitizedClassifierConfig {
                provider: config.classifier.provider,
                model: config.classifier.model.clone(),
                api_base: config.classifier.api_base().to_string(),
                api_key_configured: config
                    .classifier
                    .api_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty()),
                timeout_secs: config.classifier.timeout_secs,
                max_tokens: config.classifier.max_tokens,
            },
            script_service: config.script_service.clone(),
            render_service: config.render_service.clone(),
            upload_service: config.upload_service.clone(),
            error_tracking: SanitizedErrorTrackingConfig {
                dsn_configured: config
                    .error_tracking
                    .dsn
                    .as_deref()
                    .is_some_and(|d| !d.is_empty()),
                environment: config.error_tracking.environment.clone(),
            },
            pipeline: config.pipeline.clone(),
            schedule: config.schedule.clone(),
            logging: config.logging.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path, PathBuf::from("autotube.db"));
        assert_eq!(config.script_service.url, "http://localhost:8081/api/v1");
        assert_eq!(config.render_service.url, "http://127.0.0.1:8080/api/v1");
        assert_eq!(config.upload_service.url, "http://localhost:3000");
        assert_eq!(config.upload_service.timeout_secs, 300);
        assert_eq!(config.schedule.timezone, "America/New_York");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_deserialize_sections() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[render_service]
url = "http://renderer:8080/api/v1"
video_task_dir = "/data/tasks"

[error_tracking]
dsn = "https://key@errors.example.com/1"
environment = "staging"

[pipeline.scripting]
interval_ms = 60000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.render_service.video_task_dir, PathBuf::from("/data/tasks"));
        assert_eq!(config.error_tracking.environment, "staging");
        assert_eq!(config.pipeline.scripting.interval_ms, 60000);
        assert_eq!(config.pipeline.scripting.idle_interval_ms, 1_800_000);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config = Config::default();
        config.classifier.api_key = Some("sk-secret".to_string());
        config.error_tracking.dsn = Some("https://secret@errors.example.com/1".to_string());

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.classifier.api_key_configured);
        assert!(sanitized.error_tracking.dsn_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!json.contains("https://secret@"));
    }
}
