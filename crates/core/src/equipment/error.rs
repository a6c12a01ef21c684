//! Equipment error types.

use fieldops_shared::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

/// Equipment operation errors.
#[derive(Debug, Error)]
pub enum EquipmentError {
    /// Equipment not found.
    #[error("equipment not found: {0}")]
    EquipmentNotFound(Uuid),

    /// File record not found.
    #[error("file not found: {0}")]
    FileNotFound(Uuid),

    /// Invalid input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl EquipmentError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

impl From<EquipmentError> for AppError {
    fn from(err: EquipmentError) -> Self {
        match err {
            EquipmentError::EquipmentNotFound(_) => Self::NotFound("Equipment not found".into()),
            EquipmentError::FileNotFound(_) => Self::NotFound("File not found".into()),
            EquipmentError::Validation(msg) => Self::Validation(msg),
            EquipmentError::Storage(StorageError::Configuration(msg)) => {
                Self::ServiceUnavailable(msg)
            }
            EquipmentError::Storage(StorageError::InvalidKey(msg)) => Self::Validation(msg),
            EquipmentError::Storage(StorageError::Operation(msg) | StorageError::Signing(msg)) => {
                Self::ExternalService(msg)
            }
            EquipmentError::Storage(err) => Self::Internal(err.to_string()),
            EquipmentError::Repository(msg) => Self::Database(msg),
        }
    }
}
