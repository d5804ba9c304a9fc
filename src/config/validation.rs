//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{SeatKeeperError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_database_config(&settings.database)?;
    validate_enrollment_config(&settings.enrollment)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(SeatKeeperError::Config(
            "Bot token is required".to_string()
        ));
    }

    if config.admin_ids.is_empty() {
        return Err(SeatKeeperError::Config(
            "At least one admin ID must be configured".to_string()
        ));
    }

    if let Some(ref base) = config.qr_base_url {
        url::Url::parse(base).map_err(|e| {
            SeatKeeperError::Config(format!("Invalid QR base URL {}: {}", base, e))
        })?;
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(SeatKeeperError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(SeatKeeperError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(SeatKeeperError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate enrollment rules
fn validate_enrollment_config(config: &super::EnrollmentConfig) -> Result<()> {
    // chrono::FixedOffset accepts strictly less than a day
    if config.utc_offset_minutes.abs() >= 24 * 60 {
        return Err(SeatKeeperError::Config(format!(
            "UTC offset out of range: {} minutes", config.utc_offset_minutes
        )));
    }

    if config.code_prefix.is_empty() || !config.code_prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SeatKeeperError::Config(
            "Code prefix must be non-empty and alphanumeric".to_string()
        ));
    }

    if config.code_attempts == 0 {
        return Err(SeatKeeperError::Config(
            "Code attempts must be greater than 0".to_string()
        ));
    }

    if config.link_code_ttl_minutes <= 0 {
        return Err(SeatKeeperError::Config(
            "Link code lifetime must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(SeatKeeperError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(SeatKeeperError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.bot.token = "12345:test_token".to_string();
        settings.bot.admin_ids = vec![1];
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(validate_settings(&valid_settings()).is_ok());
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut settings = valid_settings();
        settings.bot.token.clear();
        assert_matches!(validate_settings(&settings), Err(SeatKeeperError::Config(_)));
    }

    #[test]
    fn test_bad_qr_url_rejected() {
        let mut settings = valid_settings();
        settings.bot.qr_base_url = Some("not a url".to_string());
        assert_matches!(validate_settings(&settings), Err(SeatKeeperError::Config(_)));
    }

    #[test]
    fn test_enrollment_rules_checked() {
        let mut settings = valid_settings();
        settings.enrollment.code_attempts = 0;
        assert!(validate_settings(&settings).is_err());

        let mut settings = valid_settings();
        settings.enrollment.code_prefix = "REG-".to_string();
        assert!(validate_settings(&settings).is_err());

        let mut settings = valid_settings();
        settings.enrollment.utc_offset_minutes = 24 * 60;
        assert!(validate_settings(&settings).is_err());

        let mut settings = valid_settings();
        settings.enrollment.link_code_ttl_minutes = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut settings = valid_settings();
        settings.logging.level = "loud".to_string();
        assert!(validate_settings(&settings).is_err());
    }
}
