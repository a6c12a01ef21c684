//! File persistence facade using Apache OpenDAL for object storage.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use once_cell::sync::OnceCell;
use opendal::{ErrorKind, Operator, services};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use super::config::{ObjectStorageConfig, StorageConfig};
use super::driver::StorageDriver;
use super::error::StorageError;
use super::key::{
    extract_object_key, object_url, physical_name, sanitize_file_name, validate_owner_id,
};

/// MIME type used when an upload does not declare one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Default lifetime of a signed object URL.
pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(120);

/// An uploaded file, as received from the client.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// File name given by the client.
    pub original_name: String,
    /// Declared content type.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Bytes,
}

impl FileUpload {
    /// Create an upload.
    #[must_use]
    pub fn new(
        original_name: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }
}

/// Outcome of saving a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Absolute filesystem path, object URL, or `None` for inline storage.
    pub stored_path: Option<String>,
    /// Sanitized display name.
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Content type.
    pub mime_type: String,
    /// Driver that holds the bytes.
    pub storage_type: StorageDriver,
    /// Contents, for the database driver only.
    pub data: Option<Bytes>,
}

impl StoredFile {
    /// Where the bytes of this file live.
    #[must_use]
    pub fn location(&self) -> StoredLocation {
        StoredLocation {
            stored_path: self.stored_path.clone(),
            storage_type: self.storage_type,
        }
    }
}

/// Physical location of a stored file, as recorded at save time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLocation {
    /// Stored path, if any.
    pub stored_path: Option<String>,
    /// Driver stamped at save time.
    pub storage_type: StorageDriver,
}

/// Chunked contents of a stored file.
pub type StoredBody = BoxStream<'static, io::Result<Bytes>>;

/// File contents read back from a backend.
pub struct StoredObject {
    /// Contents, streamed from the backend.
    pub body: StoredBody,
    /// Content type reported by the backend.
    pub content_type: Option<String>,
    /// Content length reported by the backend.
    pub content_length: Option<u64>,
    /// Entity tag.
    pub etag: Option<String>,
    /// Last modification time as an HTTP date.
    pub last_modified: Option<String>,
}

impl StoredObject {
    /// Collect the whole body in memory.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while streaming.
    pub async fn into_bytes(self) -> Result<Bytes, StorageError> {
        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        Ok(Bytes::from(chunks.concat()))
    }
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

/// File storage facade.
///
/// Saves go to the driver resolved from configuration; reads, deletes and
/// signing go to the driver stamped on the file. The active driver and the
/// object storage client are both resolved on first use and kept for the
/// lifetime of the facade.
pub struct FileStorage {
    config: StorageConfig,
    driver: OnceCell<StorageDriver>,
    operator: OnceCell<Operator>,
}

impl FileStorage {
    /// Create a storage facade from configuration.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            driver: OnceCell::new(),
            operator: OnceCell::new(),
        }
    }

    /// Create a storage facade whose object storage client is already built.
    ///
    /// The configuration still supplies the bucket and endpoint used for
    /// object keys and URLs.
    #[must_use]
    pub fn with_operator(config: StorageConfig, operator: Operator) -> Self {
        Self {
            config,
            driver: OnceCell::new(),
            operator: OnceCell::with_value(operator),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Driver used for new saves.
    pub fn active_driver(&self) -> StorageDriver {
        if let Some(driver) = self.driver.get() {
            return *driver;
        }
        // Resolution is pure, so a racing caller computes the same value.
        let resolved = StorageDriver::resolve(&self.config);
        let _ = self.driver.set(resolved);
        resolved
    }

    /// Object storage client, built on first use.
    fn operator(&self) -> Result<&Operator, StorageError> {
        if let Some(operator) = self.operator.get() {
            return Ok(operator);
        }
        let operator = Self::create_operator(self.config.ensure_object_storage()?)?;
        Ok(self.operator.get_or_init(|| operator))
    }

    /// Create the S3 operator. Addressing is path-style, which non-AWS
    /// providers expect, and only the supplied credentials are used.
    fn create_operator(config: &ObjectStorageConfig) -> Result<Operator, StorageError> {
        let builder = services::S3::default()
            .endpoint(&config.endpoint)
            .bucket(&config.bucket)
            .region(&config.region)
            .access_key_id(&config.access_key_id)
            .secret_access_key(&config.secret_access_key)
            .disable_config_load()
            .disable_ec2_metadata();

        Ok(Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish())
    }

    /// Save a file for `owner_id` with the active driver.
    ///
    /// The display name is `explicit_name` when given, else the upload's
    /// own name, sanitized either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner id is unusable as a path segment, if
    /// object storage is selected but not configured, or if the backend
    /// write fails.
    pub async fn save(
        &self,
        owner_id: &str,
        upload: FileUpload,
        explicit_name: Option<&str>,
    ) -> Result<StoredFile, StorageError> {
        validate_owner_id(owner_id)?;

        let display_name = explicit_name
            .filter(|name| !name.is_empty())
            .unwrap_or(&upload.original_name);
        let file_name = sanitize_file_name(display_name);
        let unique_name = physical_name(&file_name);
        let mime_type = upload
            .content_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        let size = upload.bytes.len() as u64;
        let storage_type = self.active_driver();

        let (stored_path, data) = match storage_type {
            StorageDriver::Database => (None, Some(upload.bytes)),
            StorageDriver::FileSystem => {
                let path = self
                    .save_to_file_system(owner_id, &unique_name, &upload.bytes)
                    .await?;
                (Some(path), None)
            }
            StorageDriver::ObjectStorage => {
                let url = self
                    .save_to_object_storage(owner_id, &unique_name, &mime_type, upload.bytes)
                    .await?;
                (Some(url), None)
            }
        };

        debug!(
            owner_id,
            storage_type = %storage_type,
            size,
            "Stored file"
        );

        Ok(StoredFile {
            stored_path,
            file_name,
            size,
            mime_type,
            storage_type,
            data,
        })
    }

    async fn save_to_file_system(
        &self,
        owner_id: &str,
        unique_name: &str,
        bytes: &Bytes,
    ) -> Result<String, StorageError> {
        let dir = self.config.base_path.join(owner_id);
        ensure_dir(&dir).await?;

        let target = std::path::absolute(dir.join(unique_name))?;
        tokio::fs::write(&target, bytes).await?;

        Ok(target.to_string_lossy().into_owned())
    }

    async fn save_to_object_storage(
        &self,
        owner_id: &str,
        unique_name: &str,
        mime_type: &str,
        bytes: Bytes,
    ) -> Result<String, StorageError> {
        let config = self.config.ensure_object_storage()?;
        let operator = self.operator()?;
        let key = format!("{owner_id}/{unique_name}");

        if operator.info().full_capability().write_with_content_type {
            operator
                .write_with(&key, bytes)
                .content_type(mime_type)
                .await?;
        } else {
            operator.write(&key, bytes).await?;
        }

        object_url(&config.endpoint, &config.bucket, &key)
    }

    /// Delete a stored file from the backend recorded for it.
    ///
    /// Files that are already gone count as deleted. Database-stored files
    /// are removed with their row, so nothing happens here.
    ///
    /// # Errors
    ///
    /// Returns an error for filesystem failures other than not-found, for
    /// missing object storage configuration, and for upstream failures.
    pub async fn delete(
        &self,
        stored_path: Option<&str>,
        storage_type: StorageDriver,
    ) -> Result<(), StorageError> {
        let Some(stored_path) = stored_path.filter(|p| !p.is_empty()) else {
            return Ok(());
        };

        match storage_type {
            StorageDriver::Database => Ok(()),
            StorageDriver::FileSystem => delete_local_file(Path::new(stored_path)).await,
            StorageDriver::ObjectStorage => self.delete_object(stored_path).await,
        }
    }

    async fn delete_object(&self, stored_path: &str) -> Result<(), StorageError> {
        let config = self.config.ensure_object_storage()?;
        let Some(key) = extract_object_key(stored_path, &config.bucket) else {
            return Ok(());
        };

        match self.operator()?.delete(&key).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            result => result.map_err(StorageError::from),
        }
    }

    /// Read a stored file from the backend recorded for it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InlineContent`] for database-stored files,
    /// [`StorageError::NotFound`] when the file is gone, and upstream or
    /// filesystem errors otherwise.
    pub async fn read(
        &self,
        stored_path: &str,
        storage_type: StorageDriver,
    ) -> Result<StoredObject, StorageError> {
        match storage_type {
            StorageDriver::Database => Err(StorageError::InlineContent),
            StorageDriver::FileSystem => read_local_file(Path::new(stored_path)).await,
            StorageDriver::ObjectStorage => self.read_object(stored_path).await,
        }
    }

    async fn read_object(&self, stored_path: &str) -> Result<StoredObject, StorageError> {
        let key = self.object_key(stored_path)?;
        let operator = self.operator()?;

        let meta = operator.stat(&key).await?;
        let body = operator
            .reader(&key)
            .await?
            .into_bytes_stream(..)
            .await?;

        Ok(StoredObject {
            body: body.boxed(),
            content_length: Some(meta.content_length()),
            content_type: meta.content_type().map(String::from),
            etag: meta.etag().map(String::from),
            last_modified: meta.last_modified().and_then(http_date),
        })
    }

    /// Time-limited URL granting read access to an object storage file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when object storage is not set up, an
    /// invalid key error when no key can be derived, and
    /// [`StorageError::Signing`] when the client cannot sign.
    pub async fn signed_url(
        &self,
        stored_path: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let config = self.config.ensure_object_storage()?;
        let key = self.object_key(stored_path)?;

        match self.operator()?.presign_read(&key, expires_in).await {
            Ok(request) => Ok(request.uri().to_string()),
            Err(err) => {
                error!(
                    stored_path,
                    bucket = %config.bucket,
                    endpoint = %config.endpoint,
                    error = %err,
                    "Failed to sign object URL"
                );
                Err(StorageError::signing(err.to_string()))
            }
        }
    }

    fn object_key(&self, stored_path: &str) -> Result<String, StorageError> {
        let config = self.config.ensure_object_storage()?;
        extract_object_key(stored_path, &config.bucket).ok_or_else(|| {
            StorageError::invalid_key(format!("no object key in stored path {stored_path:?}"))
        })
    }

    /// Delete files in a detached task, after the caller's own work is done.
    ///
    /// Failures are logged and otherwise ignored. The handle is only for
    /// callers that want to wait, such as tests.
    pub fn schedule_delete(self: &Arc<Self>, locations: Vec<StoredLocation>) -> JoinHandle<()> {
        let storage = Arc::clone(self);
        tokio::spawn(async move {
            for location in locations {
                let stored_path = location.stored_path.as_deref();
                if let Err(err) = storage.delete(stored_path, location.storage_type).await {
                    warn!(
                        stored_path,
                        storage_type = %location.storage_type,
                        error = %err,
                        "Failed to delete stored file"
                    );
                }
            }
        })
    }
}

async fn ensure_dir(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::create_dir_all(path).await {
        Err(e) if e.kind() != io::ErrorKind::AlreadyExists => Err(e.into()),
        _ => Ok(()),
    }
}

async fn delete_local_file(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::metadata(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
        Ok(_) => {}
    }

    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result.map_err(StorageError::from),
    }
}

async fn read_local_file(path: &Path) -> Result<StoredObject, StorageError> {
    let not_found = |e: io::Error| {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::not_found(PathBuf::from(path).display().to_string())
        } else {
            StorageError::Io(e)
        }
    };

    let file = tokio::fs::File::open(path).await.map_err(not_found)?;
    let meta = file.metadata().await?;

    Ok(StoredObject {
        body: ReaderStream::new(file).boxed(),
        content_length: Some(meta.len()),
        content_type: None,
        etag: None,
        last_modified: meta
            .modified()
            .ok()
            .map(|t| format_http_date(DateTime::<Utc>::from(t))),
    })
}

/// Render a backend timestamp as an HTTP date.
///
/// Backends report RFC 3339 (`2024-01-01T00:00:00Z`) or chrono's
/// `2024-01-01 00:00:00 UTC`.
fn http_date<T: fmt::Display>(value: T) -> Option<String> {
    let text = value.to_string();
    let parsed = DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text.trim_end_matches(" UTC"), "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })?;
    Some(format_http_date(parsed))
}

fn format_http_date(value: DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
