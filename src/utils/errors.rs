//! Error handling for SeatKeeper
//!
//! This module defines the main error type used throughout the application
//! and provides a unified error handling strategy.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::RegistrationStatus;

/// Main error type for SeatKeeper
#[derive(Error, Debug)]
pub enum SeatKeeperError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Class not found: {class_id}")]
    ClassNotFound { class_id: i64 },

    #[error("Child not found: {child_id}")]
    ChildNotFound { child_id: i64 },

    #[error("Registration not found: {code}")]
    RegistrationNotFound { code: String },

    #[error("Registration not found: #{registration_id}")]
    RegistrationIdNotFound { registration_id: i64 },

    #[error("Parent not found: {parent_id}")]
    ParentNotFound { parent_id: i64 },

    #[error("Link code is invalid, expired or already used")]
    LinkCodeInvalid,

    #[error("Chat {chat_id} is not linked to a parent")]
    ChatNotLinked { chat_id: i64 },

    #[error("Child {child_id} is already registered for class {class_id}")]
    DuplicateRegistration { child_id: i64, class_id: i64 },

    #[error("Child {child_id} already has class {conflicting_class_id} on the same day as class {class_id}")]
    SameDayConflict {
        child_id: i64,
        class_id: i64,
        conflicting_class_id: i64,
    },

    #[error("Signup for class {class_id} opens at {opens_at}")]
    SignupNotOpen {
        class_id: i64,
        opens_at: DateTime<Utc>,
    },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: RegistrationStatus,
        to: String,
    },

    #[error("Registration {code} is already checked in")]
    AlreadyCheckedIn { code: String },

    #[error("Could not generate a unique code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for SeatKeeper operations
pub type Result<T> = std::result::Result<T, SeatKeeperError>;

impl SeatKeeperError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            SeatKeeperError::Database(_) => true,
            SeatKeeperError::Storage(_) => true,
            SeatKeeperError::Telegram(_) => true,
            SeatKeeperError::CodeGenerationExhausted { .. } => true,
            SeatKeeperError::Migration(_) => false,
            SeatKeeperError::Config(_) => false,
            SeatKeeperError::ConfigSource(_) => false,
            SeatKeeperError::PermissionDenied(_) => false,
            SeatKeeperError::ClassNotFound { .. } => false,
            SeatKeeperError::ChildNotFound { .. } => false,
            SeatKeeperError::RegistrationNotFound { .. } => false,
            SeatKeeperError::RegistrationIdNotFound { .. } => false,
            SeatKeeperError::ParentNotFound { .. } => false,
            SeatKeeperError::LinkCodeInvalid => false,
            SeatKeeperError::ChatNotLinked { .. } => false,
            SeatKeeperError::DuplicateRegistration { .. } => false,
            SeatKeeperError::SameDayConflict { .. } => false,
            SeatKeeperError::SignupNotOpen { .. } => false,
            SeatKeeperError::InvalidStateTransition { .. } => false,
            SeatKeeperError::AlreadyCheckedIn { .. } => false,
            SeatKeeperError::UrlParse(_) => false,
            SeatKeeperError::InvalidInput(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SeatKeeperError::Database(_) => ErrorSeverity::Critical,
            SeatKeeperError::Migration(_) => ErrorSeverity::Critical,
            SeatKeeperError::Storage(_) => ErrorSeverity::Critical,
            SeatKeeperError::Config(_) => ErrorSeverity::Critical,
            SeatKeeperError::ConfigSource(_) => ErrorSeverity::Critical,
            SeatKeeperError::PermissionDenied(_) => ErrorSeverity::Warning,
            SeatKeeperError::DuplicateRegistration { .. }
            | SeatKeeperError::SameDayConflict { .. }
            | SeatKeeperError::SignupNotOpen { .. }
            | SeatKeeperError::AlreadyCheckedIn { .. }
            | SeatKeeperError::InvalidStateTransition { .. }
            | SeatKeeperError::InvalidInput(_)
            | SeatKeeperError::LinkCodeInvalid
            | SeatKeeperError::ChatNotLinked { .. } => ErrorSeverity::Info,
            SeatKeeperError::ClassNotFound { .. }
            | SeatKeeperError::ChildNotFound { .. }
            | SeatKeeperError::ParentNotFound { .. }
            | SeatKeeperError::RegistrationNotFound { .. }
            | SeatKeeperError::RegistrationIdNotFound { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// Referenced class, child or registration does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SeatKeeperError::ClassNotFound { .. }
                | SeatKeeperError::ChildNotFound { .. }
                | SeatKeeperError::RegistrationNotFound { .. }
                | SeatKeeperError::RegistrationIdNotFound { .. }
                | SeatKeeperError::ParentNotFound { .. }
        )
    }

    /// Registration was rejected by the conflict rules
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SeatKeeperError::DuplicateRegistration { .. } | SeatKeeperError::SameDayConflict { .. }
        )
    }

    /// Text suitable for showing to a parent or admin.
    ///
    /// Business outcomes get a specific message; infrastructure failures are
    /// collapsed into a generic one so internals never leak to chat.
    pub fn user_message(&self) -> String {
        match self {
            SeatKeeperError::DuplicateRegistration { .. } => {
                "This child is already registered for this class.".to_string()
            }
            SeatKeeperError::SameDayConflict { .. } => {
                "This child already has a registration on that day.".to_string()
            }
            SeatKeeperError::SignupNotOpen { .. } => {
                "Registration for this class is not open yet.".to_string()
            }
            SeatKeeperError::RegistrationNotFound { .. }
            | SeatKeeperError::RegistrationIdNotFound { .. } => "Code not found.".to_string(),
            SeatKeeperError::ClassNotFound { .. } => "Class not found.".to_string(),
            SeatKeeperError::ChildNotFound { .. } => "Child not found.".to_string(),
            SeatKeeperError::ParentNotFound { .. } => "Parent not found.".to_string(),
            SeatKeeperError::LinkCodeInvalid => "Code invalid or expired.".to_string(),
            SeatKeeperError::ChatNotLinked { .. } => {
                "Not linked yet. Use /link CODE with the code from the class organizer.".to_string()
            }
            SeatKeeperError::InvalidStateTransition { .. } => {
                "Only CONFIRMED registrations can be checked in.".to_string()
            }
            SeatKeeperError::AlreadyCheckedIn { .. } => "Already checked in.".to_string(),
            SeatKeeperError::PermissionDenied(_) => "You are not allowed to do that.".to_string(),
            SeatKeeperError::InvalidInput(msg) => msg.clone(),
            _ => "Something went wrong, please try again later.".to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
