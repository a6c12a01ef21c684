//! Shared errors and configuration for Fieldops.
//!
//! This crate provides common types used across all other crates:
//! - Application-wide error types
//! - Configuration management (server, database, file storage)

pub mod config;
pub mod error;

pub use config::{AppConfig, StorageSettings};
pub use error::{AppError, AppResult};
