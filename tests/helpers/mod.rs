//! Test helpers module
//!
//! This module provides utilities and helpers for testing SeatKeeper.
//! It includes a mock Telegram API server, an optional PostgreSQL test
//! database and builders for in-memory fixtures.

#![allow(dead_code)]

pub mod telegram_mock;
pub mod database_helper;
pub mod test_data;

pub use telegram_mock::*;
pub use database_helper::*;
pub use test_data::*;
