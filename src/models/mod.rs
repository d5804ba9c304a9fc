//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod account;
pub mod class;
pub mod registration;

// Re-export commonly used models
pub use account::{LinkCode, Parent, ParentRegistration};
pub use class::{Class, Child, ClassOccupancy};
pub use registration::{Registration, RegistrationStatus, NewRegistration, CreateRegistrationRequest};
