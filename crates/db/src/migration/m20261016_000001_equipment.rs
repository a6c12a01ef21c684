//! Equipment and equipment files.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(EQUIPMENT_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "ALTER TABLE IF EXISTS equipment DROP CONSTRAINT IF EXISTS fk_equipment_primary_photo;
             DROP TABLE IF EXISTS equipment_files CASCADE;
             DROP TABLE IF EXISTS equipment CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const EQUIPMENT_SQL: &str = r"
CREATE TABLE equipment (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    code VARCHAR(100) NOT NULL UNIQUE,
    category VARCHAR(100) NOT NULL,
    description TEXT,
    notes TEXT,
    primary_photo_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE equipment_files (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    equipment_id UUID NOT NULL REFERENCES equipment(id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    description TEXT,
    uploaded_by TEXT,
    file_name TEXT NOT NULL,
    size BIGINT NOT NULL CHECK (size >= 0),
    mime_type TEXT,
    -- Absolute filesystem path or object storage URL; NULL for inline data
    stored_path TEXT,
    -- Driver used at upload time; governs every later read and delete
    storage_type VARCHAR(32) NOT NULL,
    data BYTEA,
    is_primary BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

ALTER TABLE equipment
    ADD CONSTRAINT fk_equipment_primary_photo
    FOREIGN KEY (primary_photo_id) REFERENCES equipment_files(id) ON DELETE SET NULL;

CREATE INDEX idx_equipment_files_equipment ON equipment_files(equipment_id, created_at);
CREATE INDEX idx_equipment_category ON equipment(category);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_supplied_file_columns_are_unbounded() {
        let files = EQUIPMENT_SQL
            .split("CREATE TABLE equipment_files")
            .nth(1)
            .expect("equipment_files table");
        let files = &files[..files.find(");").expect("end of table")];

        for column in ["label", "uploaded_by", "file_name", "mime_type"] {
            assert!(files.contains(&format!("{column} TEXT")), "{column}");
        }
    }
}
