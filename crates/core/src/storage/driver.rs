//! Storage driver selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::config::StorageConfig;

/// Backend that holds a file's bytes.
///
/// The driver active at upload time is stamped on the file record and is
/// authoritative for every later read or delete of that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageDriver {
    /// Bytes embedded in the database row.
    Database,
    /// Bytes written under the local base directory.
    FileSystem,
    /// Bytes uploaded to an S3-compatible bucket.
    ObjectStorage,
}

impl StorageDriver {
    /// Tag persisted on file records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Database => "DATABASE",
            Self::FileSystem => "FILE_SYSTEM",
            Self::ObjectStorage => "OBJECT_STORAGE",
        }
    }

    /// Parse a persisted tag. Unknown tags (legacy records) yield `None`.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "DATABASE" => Some(Self::Database),
            "FILE_SYSTEM" => Some(Self::FileSystem),
            "OBJECT_STORAGE" => Some(Self::ObjectStorage),
            _ => None,
        }
    }

    /// Parse a configured override, accepting the documented synonyms.
    #[must_use]
    pub fn from_override(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DATABASE" => Some(Self::Database),
            "FILESYSTEM" | "FILE_SYSTEM" => Some(Self::FileSystem),
            "OBJECT_STORAGE" | "BUCKET" | "S3" => Some(Self::ObjectStorage),
            _ => None,
        }
    }

    /// Pick the active driver. First match wins:
    ///
    /// 1. a recognized explicit override
    /// 2. complete object storage credentials
    /// 3. a hosting platform without durable disk
    /// 4. the local filesystem
    #[must_use]
    pub fn resolve(config: &StorageConfig) -> Self {
        if let Some(value) = config.driver_override.as_deref() {
            match Self::from_override(value) {
                Some(driver) => return driver,
                None => tracing::warn!(driver = value, "Ignoring unknown storage driver"),
            }
        }

        if config.object_storage.is_some() {
            return Self::ObjectStorage;
        }

        if config.hosted_platform {
            return Self::Database;
        }

        Self::FileSystem
    }
}

impl fmt::Display for StorageDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectStorageConfig;
    use rstest::rstest;

    fn object_storage() -> ObjectStorageConfig {
        ObjectStorageConfig::new("https://storage.example.com", "fleet", "key", "secret")
    }

    #[rstest]
    #[case("DATABASE", StorageDriver::Database)]
    #[case("database", StorageDriver::Database)]
    #[case("FILESYSTEM", StorageDriver::FileSystem)]
    #[case("file_system", StorageDriver::FileSystem)]
    #[case("OBJECT_STORAGE", StorageDriver::ObjectStorage)]
    #[case("bucket", StorageDriver::ObjectStorage)]
    #[case(" S3 ", StorageDriver::ObjectStorage)]
    fn test_override_synonyms(#[case] value: &str, #[case] expected: StorageDriver) {
        assert_eq!(StorageDriver::from_override(value), Some(expected));
    }

    #[test]
    fn test_override_unknown() {
        assert_eq!(StorageDriver::from_override("ftp"), None);
        assert_eq!(StorageDriver::from_override(""), None);
    }

    #[test]
    fn test_tag_roundtrip() {
        for driver in [
            StorageDriver::Database,
            StorageDriver::FileSystem,
            StorageDriver::ObjectStorage,
        ] {
            assert_eq!(StorageDriver::parse(driver.as_str()), Some(driver));
        }
        assert_eq!(StorageDriver::parse("file_system"), None);
        assert_eq!(StorageDriver::parse("LEGACY"), None);
    }

    #[test]
    fn test_resolve_defaults_to_filesystem() {
        let config = StorageConfig::new("./storage/files");
        assert_eq!(StorageDriver::resolve(&config), StorageDriver::FileSystem);
    }

    #[test]
    fn test_resolve_override_wins() {
        let config = StorageConfig::new("./storage/files")
            .with_object_storage(object_storage())
            .with_hosted_platform(true)
            .with_driver_override("filesystem");
        assert_eq!(StorageDriver::resolve(&config), StorageDriver::FileSystem);
    }

    #[test]
    fn test_resolve_credentials_before_platform() {
        let config = StorageConfig::new("./storage/files")
            .with_object_storage(object_storage())
            .with_hosted_platform(true);
        assert_eq!(
            StorageDriver::resolve(&config),
            StorageDriver::ObjectStorage
        );
    }

    #[test]
    fn test_resolve_hosted_platform_uses_database() {
        let config = StorageConfig::new("./storage/files").with_hosted_platform(true);
        assert_eq!(StorageDriver::resolve(&config), StorageDriver::Database);
    }

    #[test]
    fn test_resolve_unknown_override_falls_through() {
        let config = StorageConfig::new("./storage/files")
            .with_driver_override("floppy")
            .with_hosted_platform(true);
        assert_eq!(StorageDriver::resolve(&config), StorageDriver::Database);
    }

    #[test]
    fn test_display_uses_persisted_tag() {
        assert_eq!(StorageDriver::FileSystem.to_string(), "FILE_SYSTEM");
    }
}
