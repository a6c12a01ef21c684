//! `SeaORM` Entity for equipment_files table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub label: String,
    pub description: Option<String>,
    pub uploaded_by: Option<String>,
    pub file_name: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub stored_path: Option<String>,
    /// `DATABASE`, `FILE_SYSTEM` or `OBJECT_STORAGE`; older rows may hold
    /// other tags.
    pub storage_type: String,
    #[sea_orm(column_type = "VarBinary(StringLen::None)", nullable)]
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    pub is_primary: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::equipment::Entity",
        from = "Column::EquipmentId",
        to = "super::equipment::Column::Id",
        on_delete = "Cascade"
    )]
    Equipment,
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
