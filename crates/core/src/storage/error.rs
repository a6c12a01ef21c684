//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File or object not found in storage.
    #[error("file not found: {key}")]
    NotFound {
        /// Path or key that was not found.
        key: String,
    },

    /// Storage backend configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// Signed URL generation failed.
    #[error("could not sign object URL: {0}")]
    Signing(String),

    /// Upstream storage operation failed.
    #[error("storage operation failed: {0}")]
    Operation(String),

    /// Invalid owner id, stored path or object key.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// The file's bytes live in its database record, not in a backend.
    #[error("file content is stored inline in the database")]
    InlineContent,

    /// Local filesystem error.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a signing error.
    #[must_use]
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Create an operation error.
    #[must_use]
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Create an invalid key error.
    #[must_use]
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Whether the error means the file is simply gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                key: err.to_string(),
            },
            opendal::ErrorKind::ConfigInvalid => Self::Configuration(err.to_string()),
            _ => Self::Operation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(StorageError::not_found("a/b").is_not_found());
        assert!(
            StorageError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).is_not_found()
        );
        assert!(
            !StorageError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
                .is_not_found()
        );
        assert!(!StorageError::operation("timeout").is_not_found());
    }

    #[test]
    fn test_from_opendal_error() {
        let err: StorageError =
            opendal::Error::new(opendal::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, StorageError::NotFound { .. }));

        let err: StorageError =
            opendal::Error::new(opendal::ErrorKind::Unexpected, "connection refused").into();
        assert!(matches!(err, StorageError::Operation(_)));
    }
}
