//! Equipment service implementation.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::error::EquipmentError;
use super::types::{CreateEquipmentInput, Equipment, FileRecord, NewFileRecord, UploadFileInput};
use crate::storage::{FileStorage, FileUpload, StoredLocation};

const PRIMARY_PHOTO_LABEL: &str = "Primary photo";
const PRIMARY_PHOTO_DESCRIPTION: &str = "Reference image of the equipment";
const SYSTEM_UPLOADER: &str = "System";

/// Repository trait for equipment persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
pub trait EquipmentRepository: Send + Sync {
    /// Create a new equipment record.
    fn create_equipment(
        &self,
        input: CreateEquipmentInput,
    ) -> impl std::future::Future<Output = Result<Equipment, EquipmentError>> + Send;

    /// Find equipment by ID.
    fn find_equipment(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Equipment>, EquipmentError>> + Send;

    /// Insert a file record.
    fn create_file(
        &self,
        record: NewFileRecord,
    ) -> impl std::future::Future<Output = Result<FileRecord, EquipmentError>> + Send;

    /// Find a file record by ID.
    fn find_file(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<FileRecord>, EquipmentError>> + Send;

    /// List the files of an equipment, oldest first.
    fn list_files(
        &self,
        equipment_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<FileRecord>, EquipmentError>> + Send;

    /// Delete a file record, returning it if it existed.
    fn delete_file(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<FileRecord>, EquipmentError>> + Send;

    /// In one transaction: insert `record` as the equipment's primary photo,
    /// point the equipment at it and delete the previous primary photo row.
    ///
    /// Returns the new record and the deleted previous one.
    fn replace_primary_photo(
        &self,
        record: NewFileRecord,
    ) -> impl std::future::Future<Output = Result<(FileRecord, Option<FileRecord>), EquipmentError>>
    + Send;

    /// In one transaction: delete an equipment and all its file records.
    ///
    /// Returns the deleted file records, or `None` if the equipment did not
    /// exist.
    fn delete_equipment(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Vec<FileRecord>>, EquipmentError>> + Send;
}

/// Equipment service for managing equipment and their files.
pub struct EquipmentService<R: EquipmentRepository> {
    storage: Arc<FileStorage>,
    repo: Arc<R>,
}

impl<R: EquipmentRepository> EquipmentService<R> {
    /// Create a new equipment service.
    #[must_use]
    pub fn new(storage: Arc<FileStorage>, repo: Arc<R>) -> Self {
        Self { storage, repo }
    }

    /// Create an equipment record.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is blank or the insert fails.
    pub async fn create_equipment(
        &self,
        input: CreateEquipmentInput,
    ) -> Result<Equipment, EquipmentError> {
        input.validate()?;
        self.repo.create_equipment(input).await
    }

    /// Get equipment by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the equipment does not exist or the lookup fails.
    pub async fn get_equipment(&self, id: Uuid) -> Result<Equipment, EquipmentError> {
        self.repo
            .find_equipment(id)
            .await?
            .ok_or(EquipmentError::EquipmentNotFound(id))
    }

    /// Upload a file to an equipment record.
    ///
    /// The label doubles as the stored file name. If the record cannot be
    /// inserted, the stored bytes are cleaned up in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The label is blank
    /// - Equipment does not exist
    /// - Storage fails
    /// - The record insert fails
    pub async fn upload_file(&self, input: UploadFileInput) -> Result<FileRecord, EquipmentError> {
        if input.label.trim().is_empty() {
            return Err(EquipmentError::validation("label is required"));
        }
        self.get_equipment(input.equipment_id).await?;

        let stored = self
            .storage
            .save(
                &input.equipment_id.to_string(),
                input.file,
                Some(&input.label),
            )
            .await?;
        let location = stored.location();

        let record = NewFileRecord {
            equipment_id: input.equipment_id,
            label: input.label,
            description: input.description,
            uploaded_by: input.uploaded_by,
            stored,
            is_primary: false,
        };

        match self.repo.create_file(record).await {
            Ok(file) => {
                info!(
                    file_id = %file.id,
                    equipment_id = %file.equipment_id,
                    storage_type = %file.storage_type,
                    size = file.size,
                    "Uploaded equipment file"
                );
                Ok(file)
            }
            Err(err) => {
                self.cleanup(vec![location]);
                Err(err)
            }
        }
    }

    /// Replace the primary photo of an equipment record.
    ///
    /// The previous photo's row goes away with the swap; its bytes are
    /// deleted in the background afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the equipment does not exist, storage fails or
    /// the swap fails.
    pub async fn replace_primary_photo(
        &self,
        equipment_id: Uuid,
        photo: FileUpload,
    ) -> Result<FileRecord, EquipmentError> {
        let equipment = self.get_equipment(equipment_id).await?;

        let name = format!("{}-photo", equipment.code);
        let stored = self
            .storage
            .save(&equipment_id.to_string(), photo, Some(&name))
            .await?;
        let location = stored.location();

        let record = NewFileRecord {
            equipment_id,
            label: PRIMARY_PHOTO_LABEL.to_string(),
            description: Some(PRIMARY_PHOTO_DESCRIPTION.to_string()),
            uploaded_by: Some(SYSTEM_UPLOADER.to_string()),
            stored,
            is_primary: true,
        };

        match self.repo.replace_primary_photo(record).await {
            Ok((photo, previous)) => {
                info!(
                    file_id = %photo.id,
                    %equipment_id,
                    replaced = ?previous.as_ref().map(|p| p.id),
                    "Replaced primary photo"
                );
                self.cleanup(previous.iter().filter_map(FileRecord::location).collect());
                Ok(photo)
            }
            Err(err) => {
                self.cleanup(vec![location]);
                Err(err)
            }
        }
    }

    /// Remove a file record, then delete its bytes in the background from
    /// the backend stamped on the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or the delete fails.
    pub async fn remove_file(&self, file_id: Uuid) -> Result<FileRecord, EquipmentError> {
        let file = self
            .repo
            .delete_file(file_id)
            .await?
            .ok_or(EquipmentError::FileNotFound(file_id))?;

        info!(%file_id, equipment_id = %file.equipment_id, "Removed equipment file");
        self.cleanup(file.location().into_iter().collect());
        Ok(file)
    }

    /// Delete an equipment record with all its files.
    ///
    /// Returns the removed file records.
    ///
    /// # Errors
    ///
    /// Returns an error if the equipment does not exist or the delete fails.
    pub async fn delete_equipment(&self, id: Uuid) -> Result<Vec<FileRecord>, EquipmentError> {
        let files = self
            .repo
            .delete_equipment(id)
            .await?
            .ok_or(EquipmentError::EquipmentNotFound(id))?;

        info!(equipment_id = %id, files = files.len(), "Deleted equipment");
        self.cleanup(files.iter().filter_map(FileRecord::location).collect());
        Ok(files)
    }

    /// Get a file record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or the lookup fails.
    pub async fn find_file(&self, file_id: Uuid) -> Result<FileRecord, EquipmentError> {
        self.repo
            .find_file(file_id)
            .await?
            .ok_or(EquipmentError::FileNotFound(file_id))
    }

    /// List the files of an equipment record.
    ///
    /// # Errors
    ///
    /// Returns an error if the equipment does not exist or the lookup fails.
    pub async fn list_files(&self, equipment_id: Uuid) -> Result<Vec<FileRecord>, EquipmentError> {
        self.get_equipment(equipment_id).await?;
        self.repo.list_files(equipment_id).await
    }

    fn cleanup(&self, locations: Vec<StoredLocation>) {
        if !locations.is_empty() {
            // Detached; failures are logged by the storage task.
            drop(self.storage.schedule_delete(locations));
        }
    }
}
