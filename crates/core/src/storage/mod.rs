//! File storage for equipment files.
//!
//! Files are kept in one of three backends:
//! - `DATABASE`: bytes inline in the file record
//! - `FILE_SYSTEM`: a directory per owner under a base path
//! - `OBJECT_STORAGE`: an S3-compatible bucket (Cloudflare R2, Railway, MinIO, AWS S3)
//!   accessed through Apache OpenDAL
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         FileStorage                          │
//! │  save(owner, upload)        -> active driver                 │
//! │  read / delete (path, type) -> driver stamped on the record  │
//! │  signed_url(path, ttl)      -> object storage only           │
//! ├───────────────┬──────────────────┬───────────────────────────┤
//! │ DATABASE      │ FILE_SYSTEM      │ OBJECT_STORAGE (OpenDAL)  │
//! └───────────────┴──────────────────┴───────────────────────────┘
//! ```

mod config;
mod driver;
mod error;
mod key;
mod service;

pub use config::{ObjectStorageConfig, ServeMode, StorageConfig};
pub use driver::StorageDriver;
pub use error::StorageError;
pub use key::{extract_object_key, object_url, physical_name, sanitize_file_name};
pub use service::{
    DEFAULT_MIME_TYPE, DEFAULT_SIGNED_URL_TTL, FileStorage, FileUpload, StoredFile,
    StoredBody, StoredLocation, StoredObject,
};
