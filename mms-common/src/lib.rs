//! # MMS Common Library
//!
//! Shared code for the mentorship management core:
//! - Error taxonomy and result alias
//! - TOML bootstrap configuration
//! - SQLite bootstrap, migrations and the JSON document store
//! - Domain event bus
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
