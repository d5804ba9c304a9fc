//! Parent accounts and Telegram chat linking

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::RegistrationStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Parent {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One-time code a parent sends to the bot with `/link` to link the chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LinkCode {
    pub id: i64,
    pub code: String,
    pub parent_id: i64,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LinkCode {
    /// Unused and not yet expired at `now`
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}

/// A parent's registration as listed by `/my`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ParentRegistration {
    pub registration_id: i64,
    pub code: String,
    pub status: RegistrationStatus,
    pub child_name: String,
    pub class_name: String,
    pub class_date: DateTime<Utc>,
}
