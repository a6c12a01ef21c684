//! `SeaORM` Entity for equipment table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub code: String,
    pub category: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub primary_photo_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::equipment_files::Entity")]
    EquipmentFiles,
    #[sea_orm(
        belongs_to = "super::equipment_files::Entity",
        from = "Column::PrimaryPhotoId",
        to = "super::equipment_files::Column::Id",
        on_delete = "SetNull"
    )]
    PrimaryPhoto,
}

impl Related<super::equipment_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EquipmentFiles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
