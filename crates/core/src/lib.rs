//! Core business logic for Fieldops.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence is reached through repository traits implemented by the db crate.
//!
//! # Modules
//!
//! - `storage` - File persistence across database, filesystem and object storage
//! - `equipment` - Equipment records and their files
pub mod equipment;
pub mod storage;
