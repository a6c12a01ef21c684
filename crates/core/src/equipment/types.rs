//! Equipment types and data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::EquipmentError;
use crate::storage::{FileUpload, StorageDriver, StoredFile, StoredLocation};

/// Equipment domain model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Internal code.
    pub code: String,
    /// Category.
    pub category: String,
    /// Description.
    pub description: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Current primary photo.
    pub primary_photo_id: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an equipment record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEquipmentInput {
    /// Display name.
    pub name: String,
    /// Internal code.
    pub code: String,
    /// Category.
    pub category: String,
    /// Description.
    pub description: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl CreateEquipmentInput {
    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first blank required field.
    pub fn validate(&self) -> Result<(), EquipmentError> {
        for (field, value) in [
            ("name", &self.name),
            ("code", &self.code),
            ("category", &self.category),
        ] {
            if value.trim().is_empty() {
                return Err(EquipmentError::validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// A file attached to an equipment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning equipment.
    pub equipment_id: Uuid,
    /// User-facing label.
    pub label: String,
    /// Description.
    pub description: Option<String>,
    /// Who uploaded the file.
    pub uploaded_by: Option<String>,
    /// Sanitized file name.
    pub file_name: String,
    /// Size in bytes.
    pub size: i64,
    /// Content type.
    pub mime_type: Option<String>,
    /// Filesystem path or object URL.
    pub stored_path: Option<String>,
    /// Persisted driver tag. Legacy records may hold tags outside
    /// [`StorageDriver`].
    pub storage_type: String,
    /// Inline bytes, for `DATABASE` records.
    pub data: Option<Vec<u8>>,
    /// Whether this is the equipment's primary photo.
    pub is_primary: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Driver stamped on the record, if the tag is known.
    #[must_use]
    pub fn driver(&self) -> Option<StorageDriver> {
        StorageDriver::parse(&self.storage_type)
    }

    /// Physical location for cleanup. `None` for unknown tags, whose bytes
    /// this service never wrote.
    #[must_use]
    pub fn location(&self) -> Option<StoredLocation> {
        self.driver().map(|storage_type| StoredLocation {
            stored_path: self.stored_path.clone(),
            storage_type,
        })
    }
}

/// Input for inserting a file record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    /// Owning equipment.
    pub equipment_id: Uuid,
    /// User-facing label.
    pub label: String,
    /// Description.
    pub description: Option<String>,
    /// Who uploaded the file.
    pub uploaded_by: Option<String>,
    /// Where and how the bytes were stored.
    pub stored: StoredFile,
    /// Whether this is the equipment's primary photo.
    pub is_primary: bool,
}

impl NewFileRecord {
    /// Size as stored in the database.
    #[must_use]
    pub fn size(&self) -> i64 {
        i64::try_from(self.stored.size).unwrap_or(i64::MAX)
    }
}

/// Input for uploading a file to an equipment record.
#[derive(Debug, Clone)]
pub struct UploadFileInput {
    /// Owning equipment.
    pub equipment_id: Uuid,
    /// User-facing label, also used as the file name.
    pub label: String,
    /// Description.
    pub description: Option<String>,
    /// Who uploaded the file.
    pub uploaded_by: Option<String>,
    /// The file itself.
    pub file: FileUpload,
}
