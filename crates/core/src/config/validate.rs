use super::{types::Config, ConfigError};

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Service URLs are set
/// - Classifier has the credentials its provider needs
/// - Publish hour window is a non-empty range inside one day
/// - Concurrency caps and poll intervals are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    for (name, url) in [
        ("script_service.url", &config.script_service.url),
        ("render_service.url", &config.render_service.url),
        ("upload_service.url", &config.upload_service.url),
    ] {
        if url.trim().is_empty() {
            return Err(invalid(format!("{} cannot be empty", name)));
        }
    }

    config.classifier.validate().map_err(invalid)?;

    let schedule = &config.schedule;
    if schedule.publish_hour_start >= schedule.publish_hour_end || schedule.publish_hour_end > 24 {
        return Err(invalid(format!(
            "schedule publish hours must satisfy start < end <= 24, got [{}, {})",
            schedule.publish_hour_start, schedule.publish_hour_end
        )));
    }
    schedule.tz().map_err(invalid)?;

    let pipeline = &config.pipeline;
    if pipeline.discovery.channel_concurrency == 0 {
        return Err(invalid("pipeline.discovery.channel_concurrency cannot be 0"));
    }
    if pipeline.rendering.poll_interval_ms == 0 {
        return Err(invalid("pipeline.rendering.poll_interval_ms cannot be 0"));
    }
    if pipeline.rendering.poll_attempts == 0 {
        return Err(invalid("pipeline.rendering.poll_attempts cannot be 0"));
    }
    if pipeline.reprioritize.batch_size <= 0 {
        return Err(invalid("pipeline.reprioritize.batch_size must be positive"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierProvider;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_empty_url_fails() {
        let mut config = Config::default();
        config.upload_service.url = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("upload_service.url"));
    }

    #[test]
    fn test_validate_publish_window() {
        let mut config = Config::default();
        config.schedule.publish_hour_start = 20;
        config.schedule.publish_hour_end = 20;
        assert!(validate_config(&config).is_err());

        config.schedule.publish_hour_start = 10;
        config.schedule.publish_hour_end = 25;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_unknown_timezone() {
        let mut config = Config::default();
        config.schedule.timezone = "Nowhere/Special".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_hosted_classifier_without_key() {
        let mut config = Config::default();
        config.classifier.provider = ClassifierProvider::OpenRouter;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.pipeline.discovery.channel_concurrency = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.pipeline.rendering.poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }
}
