//! Storage configuration types.

use std::path::PathBuf;

use fieldops_shared::StorageSettings;
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// S3-compatible object storage credentials: Cloudflare R2, Railway
/// buckets, MinIO, AWS S3.
///
/// Either all four required values are present or the configuration is
/// treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Endpoint URL.
    pub endpoint: String,
    /// Region, `auto` unless overridden.
    pub region: String,
    /// Bucket name.
    pub bucket: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
}

impl ObjectStorageConfig {
    /// Default region for S3-compatible providers that ignore it.
    pub const DEFAULT_REGION: &'static str = "auto";

    /// Create an object storage config with the default region.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: Self::DEFAULT_REGION.to_string(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Set the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Build from optional parts; `None` unless all four are present and
    /// non-empty.
    #[must_use]
    pub fn from_parts(
        endpoint: Option<&str>,
        bucket: Option<&str>,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
        region: Option<&str>,
    ) -> Option<Self> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.filter(|v| !v.trim().is_empty())
        }

        let config = Self::new(
            present(endpoint)?,
            present(bucket)?,
            present(access_key_id)?,
            present(secret_access_key)?,
        );
        Some(match present(region) {
            Some(region) => config.with_region(region),
            None => config,
        })
    }
}

/// How the file endpoint serves object storage files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServeMode {
    /// Read the object and return its bytes, redirecting to a signed URL
    /// only when the read fails.
    #[default]
    Stream,
    /// Always redirect to a signed URL.
    Redirect,
}

impl ServeMode {
    /// Parse a configured mode, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stream" => Some(Self::Stream),
            "redirect" => Some(Self::Redirect),
            _ => None,
        }
    }
}

/// File storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Explicit driver override, as configured.
    pub driver_override: Option<String>,
    /// Base directory for the filesystem backend.
    pub base_path: PathBuf,
    /// Object storage credentials, when complete.
    pub object_storage: Option<ObjectStorageConfig>,
    /// Whether the process runs on a hosting platform without durable disk.
    pub hosted_platform: bool,
    /// How object storage files are served.
    pub serve_mode: ServeMode,
}

impl StorageConfig {
    /// Default base directory for the filesystem backend.
    pub const DEFAULT_BASE_PATH: &'static str = "./storage/files";

    /// Create a config rooted at `base_path`, with nothing else configured.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            driver_override: None,
            base_path: base_path.into(),
            object_storage: None,
            hosted_platform: false,
            serve_mode: ServeMode::default(),
        }
    }

    /// Build from the raw environment settings.
    #[must_use]
    pub fn from_settings(settings: &StorageSettings) -> Self {
        let object_storage = ObjectStorageConfig::from_parts(
            settings.endpoint_url.as_deref(),
            settings.bucket_name.as_deref(),
            settings.access_key_id.as_deref(),
            settings.secret_access_key.as_deref(),
            Some(settings.region.as_str()),
        );

        let serve_mode = match settings.serve_mode.as_deref() {
            None => ServeMode::default(),
            Some(value) => ServeMode::parse(value).unwrap_or_else(|| {
                tracing::warn!(serve_mode = value, "Unknown serve mode, streaming instead");
                ServeMode::default()
            }),
        };

        Self {
            driver_override: settings.driver.clone().filter(|d| !d.trim().is_empty()),
            base_path: settings.path.clone(),
            object_storage,
            hosted_platform: settings.hosted_platform,
            serve_mode,
        }
    }

    /// Set the driver override.
    #[must_use]
    pub fn with_driver_override(mut self, driver: impl Into<String>) -> Self {
        self.driver_override = Some(driver.into());
        self
    }

    /// Set object storage credentials.
    #[must_use]
    pub fn with_object_storage(mut self, config: ObjectStorageConfig) -> Self {
        self.object_storage = Some(config);
        self
    }

    /// Mark the process as running on a hosting platform.
    #[must_use]
    pub fn with_hosted_platform(mut self, hosted: bool) -> Self {
        self.hosted_platform = hosted;
        self
    }

    /// Set the serve mode.
    #[must_use]
    pub fn with_serve_mode(mut self, mode: ServeMode) -> Self {
        self.serve_mode = mode;
        self
    }

    /// Object storage credentials, or a configuration error naming the
    /// variables to set.
    pub fn ensure_object_storage(&self) -> Result<&ObjectStorageConfig, StorageError> {
        self.object_storage.as_ref().ok_or_else(|| {
            StorageError::configuration(
                "object storage is not configured; set FILE_STORAGE_ENDPOINT_URL, \
                 FILE_STORAGE_BUCKET_NAME, FILE_STORAGE_ACCESS_KEY_ID and \
                 FILE_STORAGE_SECRET_ACCESS_KEY",
            )
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_PATH)
    }
}
