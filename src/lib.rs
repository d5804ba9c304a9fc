//! SeatKeeper
//!
//! Class enrollment engine: parents register children into classes with a
//! fixed capacity, get a confirmed seat or a waitlist place, and are told
//! over Telegram when a freed seat promotes them. Seat assignment is
//! recomputed in one transaction after every registration, cancellation and
//! capacity change, keeping FIFO order and never unseating a child who has
//! already checked in.

#![allow(non_snake_case)]

pub mod config;
pub mod handlers;
pub mod services;
pub mod models;
pub mod database;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{SeatKeeperError, Result};

// Re-export main components for easy access
pub use database::{EnrollmentStore, MemoryEnrollmentStore, PgEnrollmentStore};
pub use services::{AccountService, EnrollmentService, PromotionListener, PromotionNotifier, ServiceFactory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
