//! Equipment and equipment file routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::{ApiError, multipart_error},
};
use fieldops_core::equipment::{
    CreateEquipmentInput, Equipment, EquipmentService, FileRecord, UploadFileInput,
};
use fieldops_core::storage::FileUpload;
use fieldops_db::EquipmentRepository;
use fieldops_shared::AppError;

/// Creates the equipment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/equipment", post(create_equipment))
        .route(
            "/equipment/{equipment_id}",
            get(get_equipment).delete(delete_equipment),
        )
        .route(
            "/equipment/{equipment_id}/files",
            get(list_files).post(upload_file),
        )
        .route("/equipment/{equipment_id}/photo", put(replace_photo))
        .route("/files/{file_id}", delete(remove_file))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating an equipment record.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEquipmentRequest {
    /// Display name.
    #[validate(length(min = 1, max = 255, message = "name is required"))]
    pub name: String,
    /// Internal code.
    #[validate(length(min = 1, max = 100, message = "code is required"))]
    pub code: String,
    /// Category.
    #[validate(length(min = 1, max = 100, message = "category is required"))]
    pub category: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Response for an equipment record.
#[derive(Debug, Serialize)]
pub struct EquipmentResponse {
    /// Equipment ID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Internal code.
    pub code: String,
    /// Category.
    pub category: String,
    /// Description.
    pub description: Option<String>,
    /// Notes.
    pub notes: Option<String>,
    /// Primary photo download URL.
    pub primary_photo_url: Option<String>,
    /// Created at timestamp (ISO 8601).
    pub created_at: String,
    /// Updated at timestamp (ISO 8601).
    pub updated_at: String,
}

impl From<Equipment> for EquipmentResponse {
    fn from(equipment: Equipment) -> Self {
        Self {
            id: equipment.id,
            name: equipment.name,
            code: equipment.code,
            category: equipment.category,
            description: equipment.description,
            notes: equipment.notes,
            primary_photo_url: equipment.primary_photo_id.map(download_url),
            created_at: equipment.created_at.to_rfc3339(),
            updated_at: equipment.updated_at.to_rfc3339(),
        }
    }
}

/// Response for an equipment file.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    /// File ID.
    pub id: Uuid,
    /// Owning equipment ID.
    pub equipment_id: Uuid,
    /// Label.
    pub label: String,
    /// Description.
    pub description: Option<String>,
    /// Uploader.
    pub uploaded_by: Option<String>,
    /// Sanitized file name.
    pub file_name: String,
    /// Size in bytes.
    pub size: i64,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Storage driver tag.
    pub storage_type: String,
    /// Whether this is the primary photo.
    pub is_primary: bool,
    /// Download URL.
    pub url: String,
    /// Created at timestamp (ISO 8601).
    pub created_at: String,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            url: download_url(file.id),
            id: file.id,
            equipment_id: file.equipment_id,
            label: file.label,
            description: file.description,
            uploaded_by: file.uploaded_by,
            file_name: file.file_name,
            size: file.size,
            mime_type: file.mime_type,
            storage_type: file.storage_type,
            is_primary: file.is_primary,
            created_at: file.created_at.to_rfc3339(),
        }
    }
}

/// Fields of an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<FileUpload>,
    label: Option<String>,
    description: Option<String>,
    uploaded_by: Option<String>,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn download_url(file_id: Uuid) -> String {
    format!("/files/{file_id}")
}

fn service(state: &AppState) -> EquipmentService<EquipmentRepository> {
    let repo = EquipmentRepository::new(state.db.clone());
    EquipmentService::new(state.storage.clone(), Arc::new(repo))
}

/// Blank text fields count as absent.
fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, Response> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match name.as_str() {
            "file" => {
                let original_name = field.file_name().unwrap_or("file").to_owned();
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
                form.file = Some(FileUpload::new(original_name, content_type, bytes));
            }
            "label" | "description" | "uploaded_by" => {
                let value = non_blank(field.text().await.map_err(|e| multipart_error(&e))?);
                match name.as_str() {
                    "label" => form.label = value,
                    "description" => form.description = value,
                    _ => form.uploaded_by = value,
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn validation(message: &str) -> Response {
    ApiError(AppError::Validation(message.to_string())).into_response()
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/equipment`
async fn create_equipment(
    State(state): State<AppState>,
    Json(payload): Json<CreateEquipmentRequest>,
) -> Result<(StatusCode, Json<EquipmentResponse>), ApiError> {
    payload.validate()?;

    let equipment = service(&state)
        .create_equipment(CreateEquipmentInput {
            name: payload.name,
            code: payload.code,
            category: payload.category,
            description: payload.description,
            notes: payload.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(equipment.into())))
}

/// GET `/equipment/{equipment_id}`
async fn get_equipment(
    State(state): State<AppState>,
    Path(equipment_id): Path<Uuid>,
) -> Result<Json<EquipmentResponse>, ApiError> {
    let equipment = service(&state).get_equipment(equipment_id).await?;
    Ok(Json(equipment.into()))
}

/// DELETE `/equipment/{equipment_id}`
async fn delete_equipment(
    State(state): State<AppState>,
    Path(equipment_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    service(&state).delete_equipment(equipment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/equipment/{equipment_id}/files`
async fn list_files(
    State(state): State<AppState>,
    Path(equipment_id): Path<Uuid>,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let files = service(&state).list_files(equipment_id).await?;
    Ok(Json(files.into_iter().map(FileResponse::from).collect()))
}

/// POST `/equipment/{equipment_id}/files`
///
/// Multipart fields: `file`, `label`, `description`, `uploaded_by`.
async fn upload_file(
    State(state): State<AppState>,
    Path(equipment_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), Response> {
    let form = read_upload_form(multipart).await?;
    let Some(file) = form.file else {
        return Err(validation("file is required"));
    };
    let Some(label) = form.label else {
        return Err(validation("label is required"));
    };

    let record = service(&state)
        .upload_file(UploadFileInput {
            equipment_id,
            label,
            description: form.description,
            uploaded_by: form.uploaded_by,
            file,
        })
        .await
        .map_err(|e| ApiError::from(e).into_response())?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// PUT `/equipment/{equipment_id}/photo`
///
/// Multipart field: `file`.
async fn replace_photo(
    State(state): State<AppState>,
    Path(equipment_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<FileResponse>, Response> {
    let form = read_upload_form(multipart).await?;
    let Some(photo) = form.file.filter(|f| !f.bytes.is_empty()) else {
        return Err(validation("file is required"));
    };

    let record = service(&state)
        .replace_primary_photo(equipment_id, photo)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;

    Ok(Json(record.into()))
}

/// DELETE `/files/{file_id}`
async fn remove_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    service(&state).remove_file(file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
