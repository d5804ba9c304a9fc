//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub enrollment: EnrollmentConfig,
    pub logging: LoggingConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    pub token: String,
    pub admin_ids: Vec<i64>,
    /// Base URL serving `{code}.png` QR images; promotion messages skip the photo when unset
    pub qr_base_url: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// Idle connections are closed after this long; `None` keeps them
    pub idle_timeout_seconds: Option<u64>,
    /// Connections are recycled after this long; `None` keeps them
    pub max_lifetime_seconds: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/seatkeeper".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
        }
    }
}

/// Enrollment rules configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Offset of the reference time zone used for calendar-day logic
    pub utc_offset_minutes: i32,
    /// Prefix of human-facing registration codes
    pub code_prefix: String,
    /// How many random codes to try before giving up
    pub code_attempts: u32,
    /// How long a chat link code stays redeemable
    pub link_code_ttl_minutes: i64,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            // Asia/Jakarta (WIB), no DST
            utc_offset_minutes: 7 * 60,
            code_prefix: "REG".to_string(),
            code_attempts: 20,
            link_code_ttl_minutes: 10,
        }
    }
}

impl EnrollmentConfig {
    /// Reference time zone; falls back to UTC on an out-of-range offset
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
            file_prefix: "seatkeeper.log".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("SEATKEEPER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("bot.admin_ids")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::SeatKeeperError> {
        super::validation::validate_settings(self)
    }

    /// Whether the Telegram user id is configured as an admin
    pub fn is_admin(&self, telegram_user_id: i64) -> bool {
        self.bot.admin_ids.contains(&telegram_user_id)
    }
}
