//! Registration model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Seat status of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "registration_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Confirmed,
    Waitlisted,
    Canceled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Waitlisted => "waitlisted",
            RegistrationStatus::Canceled => "canceled",
        }
    }

    /// Confirmed or waitlisted; canceled registrations never count against capacity
    pub fn is_active(&self) -> bool {
        !matches!(self, RegistrationStatus::Canceled)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "waitlisted" => Ok(RegistrationStatus::Waitlisted),
            "canceled" | "cancelled" => Ok(RegistrationStatus::Canceled),
            other => Err(format!("unknown registration status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub id: i64,
    pub parent_id: i64,
    pub child_id: i64,
    pub class_id: i64,
    pub status: RegistrationStatus,
    /// Human-facing code used for lookups, QR display and cancellation
    pub code: String,
    pub check_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Checked-in registrations keep their seat no matter what
    pub fn is_anchored(&self) -> bool {
        self.check_in_at.is_some()
    }

    /// FIFO key: creation time, ties broken by insertion order
    pub fn fifo_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

/// Row to insert when a parent registers a child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistration {
    pub parent_id: i64,
    pub child_id: i64,
    pub class_id: i64,
    pub status: RegistrationStatus,
    pub code: String,
}

/// Request accepted by the enrollment service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRegistrationRequest {
    pub child_id: i64,
    pub class_id: i64,
}
