//! Bot handlers module
//!
//! This module contains the Telegram bot command handlers. Every handler is
//! a thin wrapper over the enrollment service.

pub mod commands;

// Re-export commonly used handler functions
pub use commands::*;
