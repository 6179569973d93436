//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - Repository for version-gated position writes and the resume checkpoint

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{Repository, UpsertOutcome};
