//! `SeaORM` entity definitions.

pub mod equipment;
pub mod equipment_files;

pub mod prelude {
    //! Entity re-exports.

    pub use super::equipment::Entity as Equipment;
    pub use super::equipment_files::Entity as EquipmentFiles;
}
