//! Configuration validation.

use std::collections::HashSet;

use hookwire_core::Settings;
use hookwire_framework::validate_pattern;
use url::Url;

use super::error::{ConfigError, ConfigResult};
use super::schema::{HookwireConfig, LogOutput, RouterConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HookwireConfig) -> ConfigResult<()> {
    validate_automation(&config.automation)?;
    validate_router(&config.router)?;

    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output = \"file\" requires logging.file_path",
        ));
    }

    if let Some(url) = &config.legacy.webhook_url {
        validate_url(url, "legacy.webhook_url")?;
    }

    let mut parser_ids = HashSet::new();
    for parser in &config.parsers {
        if !parser_ids.insert(parser.id.as_str()) {
            return Err(ConfigError::DuplicateParserId(parser.id.clone()));
        }
        validate_pattern(&parser.pattern).map_err(|e| ConfigError::InvalidPattern {
            id: parser.id.clone(),
            reason: e.to_string(),
        })?;
    }

    let mut webhook_ids = HashSet::new();
    for webhook in &config.webhooks {
        if webhook.id.is_empty() {
            return Err(ConfigError::validation("Webhook id cannot be empty"));
        }
        if !webhook_ids.insert(webhook.id.as_str()) {
            return Err(ConfigError::DuplicateWebhookId(webhook.id.clone()));
        }
        validate_url(&webhook.url, &format!("webhooks.{}", webhook.id))?;
    }

    Ok(())
}

fn validate_automation(settings: &Settings) -> ConfigResult<()> {
    if settings.webhook_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "automation.webhook_timeout_ms must be greater than 0",
        ));
    }
    if settings.retry_attempts == 0 {
        return Err(ConfigError::validation(
            "automation.retry_attempts must be at least 1",
        ));
    }
    // An empty prefix would disable reply loop protection.
    if settings.bot_reply_prefix.trim().is_empty() {
        return Err(ConfigError::validation(
            "automation.bot_reply_prefix cannot be empty",
        ));
    }
    Ok(())
}

fn validate_router(router: &RouterConfig) -> ConfigResult<()> {
    if router.queue_capacity == 0 || router.room_queue_capacity == 0 {
        return Err(ConfigError::validation(
            "router queue capacities must be greater than 0",
        ));
    }
    if router.room_idle_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "router.room_idle_timeout_ms must be greater than 0",
        ));
    }
    Ok(())
}

/// Checks that `url` is an absolute http(s) URL.
fn validate_url(url: &str, field: &str) -> ConfigResult<()> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::invalid_url(field, e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid_url(
            field,
            format!("unsupported scheme '{other}', expected http or https"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwire_core::{PatternRule, ServiceTag, WebhookRule};

    fn webhook(id: &str, url: &str) -> WebhookRule {
        WebhookRule::new(id, id, url, ServiceTag::Slack, "@admin:example.org")
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&HookwireConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_automation_settings() {
        let mut config = HookwireConfig::default();
        config.automation.webhook_timeout_ms = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        let mut config = HookwireConfig::default();
        config.automation.retry_attempts = 0;
        assert!(validate_config(&config).is_err());

        let mut config = HookwireConfig::default();
        config.automation.bot_reply_prefix = "  ".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_router_limits() {
        let mut config = HookwireConfig::default();
        config.router.room_queue_capacity = 0;
        assert!(validate_config(&config).is_err());

        let mut config = HookwireConfig::default();
        config.router.room_idle_timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_bad_urls_without_echoing_them() {
        let mut config = HookwireConfig::default();
        config.webhooks.push(webhook("a", "ftp://hook.example.com/s3cret"));
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
        assert!(!err.to_string().contains("s3cret"));

        let mut config = HookwireConfig::default();
        config.legacy.webhook_url = Some("not a url".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicates_and_bad_patterns() {
        let mut config = HookwireConfig::default();
        config.webhooks.push(webhook("a", "https://hook.example.com/1"));
        config.webhooks.push(webhook("a", "https://hook.example.com/2"));
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateWebhookId(id)) if id == "a"
        ));

        let mut config = HookwireConfig::default();
        config
            .parsers
            .push(PatternRule::new("p", "P", "(", ServiceTag::Custom));
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));

        let mut config = HookwireConfig::default();
        let rule = PatternRule::new("p", "P", "x", ServiceTag::Custom);
        config.parsers.extend([rule.clone(), rule]);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateParserId(_))
        ));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = HookwireConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
    }
}
