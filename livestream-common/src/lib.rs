//! # Livestream Common Library
//!
//! Shared code for the livestream results services including:
//! - Database schema initialization and models
//! - Configuration loading
//! - Timing timestamp format helpers
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
