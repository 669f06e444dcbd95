//! Test Helper Utilities
//!
//! Shared utilities for testing livestream-ingest

#![allow(dead_code)]

pub mod db_utils;
pub mod fake_sheets;

pub use db_utils::{create_test_db, register, write_timing_log};
pub use fake_sheets::FakeSheets;
