//! File download route.
//!
//! `GET /files/{file_id}` serves a stored file according to the driver
//! stamped on its record:
//! - `DATABASE`: bytes from the record
//! - `OBJECT_STORAGE`: streamed from the bucket, or a redirect to a signed URL
//! - `FILE_SYSTEM`: read from disk
//! - anything else: a redirect to the stored path as a `file://` URL

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use tracing::{error, warn};
use url::Url;
use uuid::Uuid;

use crate::{AppState, error::ApiError, error::json_error};
use fieldops_core::equipment::{EquipmentError, EquipmentService, FileRecord};
use fieldops_core::storage::{
    DEFAULT_MIME_TYPE, DEFAULT_SIGNED_URL_TTL, FileStorage, ServeMode, StorageDriver,
    StoredObject,
};
use fieldops_db::EquipmentRepository;

/// Lifetime of the signed URL used when streaming fails.
pub const FALLBACK_SIGNED_URL_TTL: Duration = Duration::from_secs(60);

const PUBLIC_CACHE: &str = "public, max-age=60";
const PRIVATE_CACHE: &str = "private, max-age=60";

/// Creates the file download routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/files/{file_id}", get(serve_file))
}

/// GET `/files/{file_id}`
async fn serve_file(State(state): State<AppState>, Path(file_id): Path<String>) -> Response {
    // Ids that are not UUIDs can never match a record.
    let Ok(file_id) = Uuid::parse_str(&file_id) else {
        return json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "File not found");
    };

    let repo = Arc::new(EquipmentRepository::new(state.db.clone()));
    let service = EquipmentService::new(state.storage.clone(), repo);

    let file = match service.find_file(file_id).await {
        Ok(file) => file,
        Err(EquipmentError::FileNotFound(_)) => {
            return json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "File not found");
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    let driver = match file.driver() {
        Some(StorageDriver::Database) => return serve_inline(&file),
        driver => driver,
    };

    let Some(stored_path) = file.stored_path.as_deref().filter(|p| !p.is_empty()) else {
        return json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "File path not available",
        );
    };

    match driver {
        Some(StorageDriver::ObjectStorage) => serve_object(&state.storage, &file, stored_path).await,
        Some(StorageDriver::FileSystem) => serve_from_disk(&state.storage, &file, stored_path).await,
        _ => redirect_to_file_url(&file, stored_path),
    }
}

fn serve_inline(file: &FileRecord) -> Response {
    let Some(data) = file.data.clone() else {
        return json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Content not available");
    };

    let mut headers = HeaderMap::new();
    insert_header(
        &mut headers,
        header::CONTENT_TYPE,
        file.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE),
    );
    insert_header(&mut headers, header::CONTENT_LENGTH, &file.size.to_string());
    insert_header(
        &mut headers,
        header::CONTENT_DISPOSITION,
        &content_disposition(&file.file_name),
    );
    insert_header(&mut headers, header::CACHE_CONTROL, PUBLIC_CACHE);

    (StatusCode::OK, headers, Body::from(data)).into_response()
}

async fn serve_object(storage: &FileStorage, file: &FileRecord, stored_path: &str) -> Response {
    if storage.config().serve_mode == ServeMode::Redirect {
        return match storage.signed_url(stored_path, DEFAULT_SIGNED_URL_TTL).await {
            Ok(url) => Redirect::temporary(&url).into_response(),
            Err(_) => Redirect::temporary(stored_path).into_response(),
        };
    }

    let err = match storage.read(stored_path, StorageDriver::ObjectStorage).await {
        Ok(object) => return stored_object_response(file, object),
        Err(err) => err,
    };
    error!(
        file_id = %file.id,
        error = %err,
        "Failed to read file from object storage"
    );

    match storage.signed_url(stored_path, FALLBACK_SIGNED_URL_TTL).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(err) => {
            error!(
                file_id = %file.id,
                error = %err,
                "Signed URL fallback failed"
            );
            json_error(
                StatusCode::BAD_GATEWAY,
                "EXTERNAL_SERVICE_ERROR",
                "Unable to retrieve the requested file",
            )
        }
    }
}

async fn serve_from_disk(storage: &FileStorage, file: &FileRecord, stored_path: &str) -> Response {
    match storage.read(stored_path, StorageDriver::FileSystem).await {
        Ok(object) => stored_object_response(file, object),
        Err(err) if err.is_not_found() => {
            warn!(file_id = %file.id, stored_path, "Stored file is missing from disk");
            json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Content not available")
        }
        Err(err) => {
            error!(file_id = %file.id, error = %err, "Failed to read file from disk");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An error occurred",
            )
        }
    }
}

fn redirect_to_file_url(file: &FileRecord, stored_path: &str) -> Response {
    match Url::parse("file:///").and_then(|base| base.join(stored_path)) {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(err) => {
            warn!(
                file_id = %file.id,
                storage_type = %file.storage_type,
                error = %err,
                "Unusable stored path"
            );
            json_error(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "File path not available",
            )
        }
    }
}

fn stored_object_response(file: &FileRecord, object: StoredObject) -> Response {
    let mut headers = HeaderMap::new();
    let content_type = object
        .content_type
        .as_deref()
        .or(file.mime_type.as_deref())
        .unwrap_or(DEFAULT_MIME_TYPE);

    insert_header(&mut headers, header::CONTENT_TYPE, content_type);
    insert_header(&mut headers, header::CACHE_CONTROL, PRIVATE_CACHE);
    insert_header(
        &mut headers,
        header::CONTENT_DISPOSITION,
        &content_disposition(&file.file_name),
    );
    if let Some(length) = object.content_length {
        insert_header(&mut headers, header::CONTENT_LENGTH, &length.to_string());
    }
    if let Some(etag) = &object.etag {
        insert_header(&mut headers, header::ETAG, etag);
    }
    if let Some(last_modified) = &object.last_modified {
        insert_header(&mut headers, header::LAST_MODIFIED, last_modified);
    }

    (StatusCode::OK, headers, Body::from_stream(object.body)).into_response()
}

fn content_disposition(file_name: &str) -> String {
    format!("inline; filename=\"{}\"", file_name.replace('"', "\\\""))
}

/// Values that are not valid header text are dropped.
fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router;
    use axum::http::Request;
    use chrono::Utc;
    use fieldops_core::storage::{ObjectStorageConfig, StorageConfig};
    use fieldops_db::entities::equipment_files;
    use http_body_util::BodyExt;
    use opendal::{Operator, services};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use tower::ServiceExt;

    const BUCKET: &str = "fleet";
    const ENDPOINT: &str = "https://storage.example.com";
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn file_model(
        storage_type: &str,
        stored_path: Option<&str>,
        data: Option<&[u8]>,
    ) -> equipment_files::Model {
        equipment_files::Model {
            id: Uuid::new_v4(),
            equipment_id: Uuid::new_v4(),
            label: "Manual".into(),
            description: None,
            uploaded_by: None,
            file_name: "manual.txt".into(),
            size: data.map_or(5, |d| d.len() as i64),
            mime_type: Some("text/plain".into()),
            stored_path: stored_path.map(String::from),
            storage_type: storage_type.into(),
            data: data.map(<[u8]>::to_vec),
            is_primary: false,
            created_at: Utc::now().into(),
        }
    }

    fn memory_operator() -> Operator {
        Operator::new(services::Memory::default())
            .expect("memory operator")
            .finish()
    }

    fn object_config(endpoint: &str) -> StorageConfig {
        StorageConfig::new("./unused").with_object_storage(ObjectStorageConfig::new(
            endpoint, BUCKET, "key", "secret",
        ))
    }

    async fn get_file(storage: FileStorage, records: Vec<equipment_files::Model>) -> Response {
        let id = records.first().map_or_else(Uuid::new_v4, |r| r.id);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([records])
            .into_connection();
        let app = create_router(AppState {
            db: Arc::new(db),
            storage: Arc::new(storage),
            max_upload_bytes: 1024 * 1024,
        });

        app.oneshot(
            Request::builder()
                .uri(format!("/files/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    async fn message(response: Response) -> String {
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        body["message"].as_str().unwrap_or_default().to_string()
    }

    fn header_str<'a>(response: &'a Response, name: HeaderName) -> &'a str {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_unknown_file_is_404() {
        let response = get_file(FileStorage::new(StorageConfig::default()), vec![]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(message(response).await, "File not found");
    }

    #[tokio::test]
    async fn test_malformed_file_id_is_json_404() {
        let app = create_router(AppState {
            db: Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection()),
            storage: Arc::new(FileStorage::new(StorageConfig::default())),
            max_upload_bytes: 1024,
        });

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(header_str(&response, header::CONTENT_TYPE).starts_with("application/json"));
        assert_eq!(message(response).await, "File not found");
    }

    #[tokio::test]
    async fn test_inline_file_served_from_record() {
        let mut record = file_model("DATABASE", None, Some(b"hello"));
        record.file_name = "a\"b.txt".into();

        let response = get_file(FileStorage::new(StorageConfig::default()), vec![record]).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_TYPE), "text/plain");
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "5");
        assert_eq!(
            header_str(&response, header::CONTENT_DISPOSITION),
            r#"inline; filename="a\"b.txt""#
        );
        assert_eq!(header_str(&response, header::CACHE_CONTROL), PUBLIC_CACHE);
        assert_eq!(body_bytes(response).await, b"hello");
    }

    #[tokio::test]
    async fn test_inline_file_without_data() {
        let record = file_model("DATABASE", None, None);
        let response = get_file(FileStorage::new(StorageConfig::default()), vec![record]).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(message(response).await, "Content not available");
    }

    #[tokio::test]
    async fn test_missing_stored_path() {
        let record = file_model("OBJECT_STORAGE", None, None);
        let response = get_file(FileStorage::new(StorageConfig::default()), vec![record]).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(message(response).await, "File path not available");
    }

    #[tokio::test]
    async fn test_object_streamed_from_bucket() {
        let operator = memory_operator();
        operator
            .write("e1/manual.txt", b"hello".to_vec())
            .await
            .unwrap();
        let storage = FileStorage::with_operator(object_config(ENDPOINT), operator);
        let record = file_model(
            "OBJECT_STORAGE",
            Some("https://storage.example.com/fleet/e1/manual.txt"),
            None,
        );

        let response = get_file(storage, vec![record]).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "5");
        assert_eq!(header_str(&response, header::CACHE_CONTROL), PRIVATE_CACHE);
        assert_eq!(
            header_str(&response, header::CONTENT_DISPOSITION),
            r#"inline; filename="manual.txt""#
        );
        assert_eq!(body_bytes(response).await, b"hello");
    }

    #[tokio::test]
    async fn test_unreachable_bucket_redirects_to_signed_url() {
        let storage = FileStorage::new(object_config(UNREACHABLE));
        let record = file_model(
            "OBJECT_STORAGE",
            Some("http://127.0.0.1:9/fleet/e1/manual.txt"),
            None,
        );

        let response = get_file(storage, vec![record]).await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = header_str(&response, header::LOCATION);
        assert!(location.starts_with("http://127.0.0.1:9/fleet/e1/manual.txt?"));
        assert!(location.contains("X-Amz-Signature="));
        assert!(location.contains("X-Amz-Expires=60"));
    }

    #[tokio::test]
    async fn test_read_and_signing_failure_is_502() {
        let storage = FileStorage::with_operator(object_config(ENDPOINT), memory_operator());
        let record = file_model(
            "OBJECT_STORAGE",
            Some("https://storage.example.com/fleet/e1/missing.txt"),
            None,
        );

        let response = get_file(storage, vec![record]).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(message(response).await, "Unable to retrieve the requested file");
    }

    #[tokio::test]
    async fn test_redirect_mode_signs_for_two_minutes() {
        let storage =
            FileStorage::new(object_config(UNREACHABLE).with_serve_mode(ServeMode::Redirect));
        let record = file_model(
            "OBJECT_STORAGE",
            Some("http://127.0.0.1:9/fleet/e1/manual.txt"),
            None,
        );

        let response = get_file(storage, vec![record]).await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert!(header_str(&response, header::LOCATION).contains("X-Amz-Expires=120"));
    }

    #[tokio::test]
    async fn test_redirect_mode_falls_back_to_stored_path() {
        let storage = FileStorage::with_operator(
            object_config(ENDPOINT).with_serve_mode(ServeMode::Redirect),
            memory_operator(),
        );
        let stored_path = "https://storage.example.com/fleet/e1/manual.txt";
        let record = file_model("OBJECT_STORAGE", Some(stored_path), None);

        let response = get_file(storage, vec![record]).await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(header_str(&response, header::LOCATION), stored_path);
    }

    #[tokio::test]
    async fn test_filesystem_file_served_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual.txt");
        std::fs::write(&path, b"from disk").unwrap();
        let record = file_model("FILE_SYSTEM", Some(path.to_str().unwrap()), None);

        let response = get_file(FileStorage::new(StorageConfig::new(dir.path())), vec![record]).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_TYPE), "text/plain");
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "9");
        assert!(header_str(&response, header::LAST_MODIFIED).ends_with(" GMT"));
        assert_eq!(body_bytes(response).await, b"from disk");
    }

    #[tokio::test]
    async fn test_filesystem_file_missing_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        let record = file_model("FILE_SYSTEM", Some(path.to_str().unwrap()), None);

        let response = get_file(FileStorage::new(StorageConfig::new(dir.path())), vec![record]).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(message(response).await, "Content not available");
    }

    #[tokio::test]
    async fn test_legacy_tag_redirects_to_file_url() {
        let record = file_model("LEGACY", Some("/legacy/manual.txt"), None);
        let response = get_file(FileStorage::new(StorageConfig::default()), vec![record]).await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            header_str(&response, header::LOCATION),
            "file:///legacy/manual.txt"
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes() {
        assert_eq!(
            content_disposition("say \"hi\".txt"),
            r#"inline; filename="say \"hi\".txt""#
        );
    }
}
