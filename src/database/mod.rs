//! Database module
//!
//! This module handles database connections and the enrollment store
//! implementations

pub mod connection;
pub mod store;
pub mod postgres;
pub mod memory;

// Re-export commonly used database components
pub use connection::{DatabasePool, create_pool, health_check, pool_options, run_migrations};
pub use store::{EnrollmentStore, EnrollmentTx, ChildBooking, PromotionRecipient};
pub use postgres::PgEnrollmentStore;
pub use memory::MemoryEnrollmentStore;
