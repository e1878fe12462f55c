//! Configuration validation.
//!
//! Loading only checks shape; these checks run before the runtime starts.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, LogOutput, LoggingConfig, PollingConfig, TelebindConfig};
use telebind_api::UpdateType;

/// Largest batch `getUpdates` accepts.
pub const MAX_POLL_LIMIT: u32 = 100;

/// Validates the entire configuration.
pub fn validate_config(config: &TelebindConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_polling_config(&config.polling)?;
    validate_logging_config(&config.logging)?;

    if config.bot.request_timeout_secs <= config.polling.timeout_secs {
        return Err(ConfigError::validation(format!(
            "bot.request_timeout_secs ({}) must exceed polling.timeout_secs ({}), \
             otherwise every idle long poll times out client-side",
            config.bot.request_timeout_secs, config.polling.timeout_secs
        )));
    }

    Ok(())
}

/// Validates credentials and the API endpoint.
pub fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.token.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }
    if bot.token.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation("bot.token cannot contain whitespace"));
    }
    if bot.request_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "bot.request_timeout_secs must be greater than 0",
        ));
    }

    validate_url(&bot.api_url)
}

/// Validates the long-poll settings on their own.
///
/// Used directly when the caller brings its own transport and the bot
/// section does not apply.
pub fn validate_polling_config(polling: &PollingConfig) -> ConfigResult<()> {
    if polling.timeout_secs == 0 {
        return Err(ConfigError::validation(
            "polling.timeout_secs must be greater than 0",
        ));
    }

    if let Some(limit) = polling.limit.filter(|l| !(1..=MAX_POLL_LIMIT).contains(l)) {
        return Err(ConfigError::validation(format!(
            "polling.limit must be between 1 and {MAX_POLL_LIMIT}, got {limit}"
        )));
    }

    let requests_unknown = polling
        .allowed_updates
        .as_ref()
        .is_some_and(|types| types.contains(&UpdateType::Unknown));
    if requests_unknown {
        return Err(ConfigError::validation(
            "polling.allowed_updates cannot contain \"unknown\"",
        ));
    }

    if polling.initial_offset < 0 {
        return Err(ConfigError::validation(
            "polling.initial_offset cannot be negative",
        ));
    }

    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    for (target, level) in &logging.filters {
        if !valid_log_levels.contains(&level.to_lowercase().as_str()) {
            return Err(ConfigError::validation(format!(
                "Invalid log level for {target}: {level}. Valid values are: {valid_log_levels:?}"
            )));
        }
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

/// Validates the API base URL.
fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("bot.api_url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> TelebindConfig {
        let mut config = TelebindConfig::default();
        config.bot.token = "123456:ABC-DEF".to_string();
        config
    }

    #[test]
    fn test_validate_defaults_with_token() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_validate_missing_token() {
        let err = validate_config(&TelebindConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "bot.token"));
    }

    #[test]
    fn test_validate_zero_poll_timeout() {
        let mut config = valid();
        config.polling.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_limit_range() {
        let mut config = valid();
        config.polling.limit = Some(0);
        assert!(validate_config(&config).is_err());

        config.polling.limit = Some(101);
        assert!(validate_config(&config).is_err());

        config.polling.limit = Some(100);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_request_timeout_exceeds_poll_timeout() {
        let mut config = valid();
        config.polling.timeout_secs = 30;
        config.bot.request_timeout_secs = 30;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_api_url_scheme() {
        let mut config = valid();
        config.bot.api_url = "ftp://api.telegram.org".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_validate_invalid_filter_level() {
        let mut config = valid();
        config
            .logging
            .filters
            .insert("telebind_runtime".to_string(), "loud".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_unknown_allowed_update() {
        let mut polling = PollingConfig::default();
        polling.allowed_updates = Some(vec![UpdateType::Message, UpdateType::Unknown]);
        assert!(validate_polling_config(&polling).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
    }
}
