//! Class and child models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Class {
    pub id: i64,
    pub name: String,
    pub class_date: DateTime<Utc>,
    /// Maximum number of simultaneously confirmed registrations.
    pub capacity: i32,
    /// `None` means signup is open now.
    pub signup_opens_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Class {
    /// Whether parents may register at `now`
    pub fn is_signup_open(&self, now: DateTime<Utc>) -> bool {
        self.signup_opens_at.map_or(true, |opens_at| now >= opens_at)
    }

    /// Capacity as a seat budget; negative values count as zero.
    pub fn seat_budget(&self) -> usize {
        self.capacity.max(0) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Child {
    pub id: i64,
    pub parent_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Seat usage of one class, as shown on the admin roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassOccupancy {
    pub class_id: i64,
    pub class_name: String,
    pub capacity: i32,
    /// Confirmed and not yet checked in
    pub confirmed: i64,
    pub waitlisted: i64,
    pub checked_in: i64,
}

impl ClassOccupancy {
    /// Seats still free; never negative even when check-ins overshoot capacity
    pub fn available(&self) -> i64 {
        (i64::from(self.capacity) - self.confirmed - self.checked_in).max(0)
    }

    pub fn fill_percent(&self) -> i64 {
        if self.capacity <= 0 {
            return 0;
        }
        (self.confirmed + self.checked_in) * 100 / i64::from(self.capacity)
    }

    pub fn is_full(&self) -> bool {
        self.available() == 0
    }
}
