//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the SeatKeeper application.

use tracing::{info, warn, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::config::LoggingConfig;
use crate::utils::errors::{SeatKeeperError, Result};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .try_init()
        .map_err(|e| SeatKeeperError::Config(format!("Failed to install logger: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log parent-facing enrollment actions with structured data
pub fn log_enrollment_action(action: &str, registration_id: i64, class_id: i64, details: Option<&str>) {
    info!(
        action = action,
        registration_id = registration_id,
        class_id = class_id,
        details = details,
        "Enrollment action performed"
    );
}

/// Log the outcome of a rebalance pass
pub fn log_rebalance(class_id: i64, changed: usize, promoted: usize, demoted: usize) {
    if changed == 0 {
        debug!(class_id = class_id, "Rebalance left class unchanged");
    } else {
        info!(
            class_id = class_id,
            changed = changed,
            promoted = promoted,
            demoted = demoted,
            "Rebalance updated seat assignments"
        );
    }
}

/// Log a Telegram chat being linked to a parent
pub fn log_chat_linked(parent_id: i64, chat_id: i64) {
    info!(parent_id = parent_id, chat_id = chat_id, "Chat linked to parent");
}

/// Log admin actions
pub fn log_admin_action(admin_id: i64, action: &str, target: Option<&str>, details: Option<&str>) {
    warn!(
        admin_id = admin_id,
        action = action,
        target = target,
        details = details,
        "Admin action performed"
    );
}

/// Log a swallowed promotion notification failure
pub fn log_notification_failure(listener: &str, registration_id: i64, error: &str) {
    warn!(
        listener = listener,
        registration_id = registration_id,
        error = error,
        "Promotion notification failed"
    );
}
