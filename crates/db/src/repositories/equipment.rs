//! Equipment repository for database operations.
//!
//! Implements equipment and equipment file persistence using SeaORM.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{equipment, equipment_files};
use fieldops_core::equipment::{
    CreateEquipmentInput, Equipment, EquipmentError, EquipmentRepository as EquipmentRepoTrait,
    FileRecord, NewFileRecord,
};

/// Equipment repository implementation.
#[derive(Debug, Clone)]
pub struct EquipmentRepository {
    db: Arc<DatabaseConnection>,
}

impl EquipmentRepository {
    /// Create a new equipment repository.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl EquipmentRepoTrait for EquipmentRepository {
    async fn create_equipment(
        &self,
        input: CreateEquipmentInput,
    ) -> Result<Equipment, EquipmentError> {
        let now = Utc::now();
        let active_model = equipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            code: Set(input.code),
            category: Set(input.category),
            description: Set(input.description),
            notes: Set(input.notes),
            primary_photo_id: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let model = active_model.insert(self.db.as_ref()).await.map_err(db_err)?;
        Ok(equipment_to_domain(model))
    }

    async fn find_equipment(&self, id: Uuid) -> Result<Option<Equipment>, EquipmentError> {
        let model = equipment::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(model.map(equipment_to_domain))
    }

    async fn create_file(&self, record: NewFileRecord) -> Result<FileRecord, EquipmentError> {
        let model = new_file_model(record)
            .insert(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(file_to_domain(model))
    }

    async fn find_file(&self, id: Uuid) -> Result<Option<FileRecord>, EquipmentError> {
        let model = equipment_files::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(model.map(file_to_domain))
    }

    async fn list_files(&self, equipment_id: Uuid) -> Result<Vec<FileRecord>, EquipmentError> {
        let models = equipment_files::Entity::find()
            .filter(equipment_files::Column::EquipmentId.eq(equipment_id))
            .order_by_asc(equipment_files::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(models.into_iter().map(file_to_domain).collect())
    }

    async fn delete_file(&self, id: Uuid) -> Result<Option<FileRecord>, EquipmentError> {
        let Some(model) = equipment_files::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        // primary_photo_id is cleared by ON DELETE SET NULL.
        let result = equipment_files::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok((result.rows_affected > 0).then(|| file_to_domain(model)))
    }

    async fn replace_primary_photo(
        &self,
        record: NewFileRecord,
    ) -> Result<(FileRecord, Option<FileRecord>), EquipmentError> {
        let equipment_id = record.equipment_id;
        let txn = self.db.begin().await.map_err(db_err)?;

        let equipment = equipment::Entity::find_by_id(equipment_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(EquipmentError::EquipmentNotFound(equipment_id))?;

        let photo = new_file_model(record)
            .insert(&txn)
            .await
            .map_err(db_err)?;

        let previous = match equipment.primary_photo_id {
            Some(previous_id) => equipment_files::Entity::find_by_id(previous_id)
                .one(&txn)
                .await
                .map_err(db_err)?,
            None => None,
        };

        let mut active: equipment::ActiveModel = equipment.into();
        active.primary_photo_id = Set(Some(photo.id));
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await.map_err(db_err)?;

        if let Some(previous) = &previous {
            equipment_files::Entity::delete_by_id(previous.id)
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;

        debug!(
            %equipment_id,
            photo_id = %photo.id,
            "Primary photo swapped"
        );

        Ok((file_to_domain(photo), previous.map(file_to_domain)))
    }

    async fn delete_equipment(&self, id: Uuid) -> Result<Option<Vec<FileRecord>>, EquipmentError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let exists = equipment::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .is_some();
        if !exists {
            return Ok(None);
        }

        let files = equipment_files::Entity::find()
            .filter(equipment_files::Column::EquipmentId.eq(id))
            .all(&txn)
            .await
            .map_err(db_err)?;

        equipment_files::Entity::delete_many()
            .filter(equipment_files::Column::EquipmentId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        equipment::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        Ok(Some(files.into_iter().map(file_to_domain).collect()))
    }
}

fn db_err(err: DbErr) -> EquipmentError {
    EquipmentError::repository(err.to_string())
}

/// Convert a new file record into an active model.
fn new_file_model(record: NewFileRecord) -> equipment_files::ActiveModel {
    let size = record.size();
    let stored = record.stored;

    equipment_files::ActiveModel {
        id: Set(Uuid::new_v4()),
        equipment_id: Set(record.equipment_id),
        label: Set(record.label),
        description: Set(record.description),
        uploaded_by: Set(record.uploaded_by),
        file_name: Set(stored.file_name),
        size: Set(size),
        mime_type: Set(Some(stored.mime_type)),
        stored_path: Set(stored.stored_path),
        storage_type: Set(stored.storage_type.as_str().to_string()),
        data: Set(stored.data.map(|bytes| bytes.to_vec())),
        is_primary: Set(record.is_primary),
        created_at: Set(Utc::now().into()),
    }
}

/// Convert database model to domain model.
fn equipment_to_domain(model: equipment::Model) -> Equipment {
    Equipment {
        id: model.id,
        name: model.name,
        code: model.code,
        category: model.category,
        description: model.description,
        notes: model.notes,
        primary_photo_id: model.primary_photo_id,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

/// Convert database model to domain model.
fn file_to_domain(model: equipment_files::Model) -> FileRecord {
    FileRecord {
        id: model.id,
        equipment_id: model.equipment_id,
        label: model.label,
        description: model.description,
        uploaded_by: model.uploaded_by,
        file_name: model.file_name,
        size: model.size,
        mime_type: model.mime_type,
        stored_path: model.stored_path,
        storage_type: model.storage_type,
        data: model.data,
        is_primary: model.is_primary,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
