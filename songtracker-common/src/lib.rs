//! # Song Tracker Common Library
//!
//! Shared code for the song tracker service and its tooling:
//! - Database initialization and row models
//! - User record validation
//! - Password hashing
//! - Configuration loading and root folder resolution
//! - Time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod password;
pub mod time;
pub mod validation;

pub use error::{Error, Result};
