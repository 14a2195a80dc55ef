//! Resource listing, delivery and admin upload

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use studzy_common::db::{Resource, UserProgress};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::db::activity::{self, ActivityKind};
use crate::db::resources::{self as resource_db, IngestStatus, NewResource};
use crate::db::{courses, progress};
use crate::error::{ApiError, ApiResult};
use crate::services::rag;
use crate::storage::{self, ObjectStore};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResourceListQuery {
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub resource_id: String,
    pub view_count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    /// Extracted text; when absent the stored object is read (text types only)
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub resource_id: String,
    pub chunk_count: usize,
}

async fn load_resource(state: &AppState, id: &str) -> ApiResult<Resource> {
    resource_db::get_resource(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("resource {}", id)))
}

/// GET /api/courses/:id/resources
pub async fn list_course_resources(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(course_id): Path<String>,
    Query(query): Query<ResourceListQuery>,
) -> ApiResult<Json<Vec<Resource>>> {
    if courses::get_course(&state.db, &course_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("course {}", course_id)));
    }
    let resources =
        resource_db::list_for_course(&state.db, &course_id, query.resource_type.as_deref())
            .await?;
    Ok(Json(resources))
}

/// GET /api/resources/:id
pub async fn get_resource(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Resource>> {
    Ok(Json(load_resource(&state, &id).await?))
}

/// GET /api/resources/:id/file
pub async fn get_resource_file(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let resource = load_resource(&state, &id).await?;
    let bytes = state.storage.get(&resource.storage_key).await?;
    let disposition = format!(
        "inline; filename=\"{}.{}\"",
        resource.id,
        storage::extension_for(&resource.mime_type)
    );

    Ok((
        [
            (header::CONTENT_TYPE, resource.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// POST /api/resources/:id/view
pub async fn record_view(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ViewResponse>> {
    let resource = load_resource(&state, &id).await?;
    let view_count = resource_db::increment_view_count(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("resource {}", id)))?;

    activity::record(
        &state.db,
        user.id(),
        ActivityKind::View,
        Some(&resource.id),
        Some(&resource.course_id),
    )
    .await?;

    Ok(Json(ViewResponse {
        resource_id: id,
        view_count,
    }))
}

/// POST /api/resources/:id/complete
pub async fn mark_complete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<UserProgress>> {
    let resource = load_resource(&state, &id).await?;
    let progress = progress::upsert(&state.db, user.id(), &resource.id, 100.0, None, true).await?;

    activity::record(
        &state.db,
        user.id(),
        ActivityKind::Complete,
        Some(&resource.id),
        Some(&resource.course_id),
    )
    .await?;

    Ok(Json(progress))
}

/// Fields collected from the upload form
#[derive(Default)]
struct UploadForm {
    course_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    file: Option<UploadedFile>,
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

fn multipart_error(err: axum::extract::multipart::MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!("uploads are limited to {} bytes", limit))
    } else {
        ApiError::BadRequest(format!("invalid multipart body: {}", err))
    }
}

async fn read_upload_form(mut multipart: Multipart, limit: usize) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "course_id" | "title" | "description" => {
                let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
                let value = value.trim().to_string();
                let slot = match name.as_str() {
                    "course_id" => &mut form.course_id,
                    "title" => &mut form.title,
                    _ => &mut form.description,
                };
                *slot = (!value.is_empty()).then_some(value);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// MIME type of an upload: the part's declared type, falling back to the
/// file extension when the client sent a generic one
fn upload_mime(file: &UploadedFile) -> Option<&'static str> {
    let declared = file
        .content_type
        .as_deref()
        .and_then(|ct| storage::resource_type_for(ct).map(|_| ct));

    match declared {
        Some(ct) => storage::ALLOWED_MIME_TYPES
            .iter()
            .map(|(mime, _)| *mime)
            .find(|mime| ct.to_ascii_lowercase().starts_with(mime)),
        None => file.file_name.as_deref().and_then(storage::mime_from_filename),
    }
}

/// POST /api/admin/resources (multipart)
///
/// Stores the object first, then the row; if the row cannot be written the
/// object is removed again. Text resources are queued for ingestion.
pub async fn upload_resource(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Resource>)> {
    let limit = state.config.server.max_upload_bytes;
    let form = read_upload_form(multipart, limit).await?;

    let course_id = form
        .course_id
        .ok_or_else(|| ApiError::BadRequest("course_id is required".to_string()))?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("file is required".to_string()))?;

    if courses::get_course(&state.db, &course_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("course {}", course_id)));
    }
    if file.bytes.is_empty() {
        return Err(ApiError::BadRequest("file is empty".to_string()));
    }
    if file.bytes.len() > limit {
        return Err(ApiError::PayloadTooLarge(format!(
            "file is {} bytes, uploads are limited to {} bytes",
            file.bytes.len(),
            limit
        )));
    }

    let mime_type = upload_mime(&file).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "unsupported file type {}",
            file.content_type.as_deref().unwrap_or("(none)")
        ))
    })?;
    let resource_type = storage::resource_type_for(mime_type)
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported file type {}", mime_type)))?;

    let title = form
        .title
        .or_else(|| file.file_name.clone())
        .ok_or_else(|| ApiError::BadRequest("title is required".to_string()))?;

    let id = Uuid::new_v4().to_string();
    let storage_key = ObjectStore::key_for(&course_id, &id, mime_type);
    state.storage.put(&storage_key, &file.bytes).await?;

    let new = NewResource {
        id,
        course_id,
        title,
        description: form.description,
        resource_type: resource_type.to_string(),
        mime_type: mime_type.to_string(),
        storage_key: storage_key.clone(),
        size_bytes: file.bytes.len() as i64,
        uploaded_by: Some(admin.id().to_string()),
    };

    let resource = match resource_db::insert_resource(&state.db, &new).await {
        Ok(resource) => resource,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&storage_key).await {
                warn!(key = %storage_key, "Failed to remove orphaned object: {}", cleanup);
            }
            return Err(e.into());
        }
    };

    info!(
        resource_id = %resource.id,
        course_id = %resource.course_id,
        mime = %resource.mime_type,
        bytes = resource.size_bytes,
        "Uploaded resource"
    );

    if storage::is_text_mime(mime_type) {
        let text = String::from_utf8_lossy(&file.bytes).into_owned();
        rag::spawn_ingestion(state.clone(), resource.clone(), text);
    } else if resource_type != "pdf" {
        resource_db::set_ingest_status(&state.db, &resource.id, IngestStatus::Skipped).await?;
    }

    Ok((StatusCode::CREATED, Json(resource)))
}

/// DELETE /api/admin/resources/:id
pub async fn delete_resource(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let resource = load_resource(&state, &id).await?;
    if !resource_db::delete_resource(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("resource {}", id)));
    }

    if let Err(e) = state.storage.delete(&resource.storage_key).await {
        warn!(resource_id = %id, "Failed to delete stored object: {}", e);
    }

    info!(resource_id = %id, admin = %admin.id(), "Deleted resource");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/resources/:id/ingest
///
/// Runs ingestion inline so the caller sees the chunk count or the failure.
pub async fn ingest_resource(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    body: Option<Json<IngestRequest>>,
) -> ApiResult<Json<IngestResponse>> {
    let resource = load_resource(&state, &id).await?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let text = match request.text {
        Some(text) => text,
        None if storage::is_text_mime(&resource.mime_type) => {
            let bytes = state.storage.get(&resource.storage_key).await?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
        None => {
            return Err(ApiError::BadRequest(format!(
                "{} resources need extracted text to be supplied",
                resource.resource_type
            )))
        }
    };

    let chunk_count = rag::ingest_resource(&state, &resource, &text).await?;
    Ok(Json(IngestResponse {
        resource_id: id,
        chunk_count,
    }))
}

pub fn resource_routes() -> Router<AppState> {
    Router::new()
        .route("/api/courses/:id/resources", get(list_course_resources))
        .route("/api/resources/:id", get(get_resource))
        .route("/api/resources/:id/file", get(get_resource_file))
        .route("/api/resources/:id/view", post(record_view))
        .route("/api/resources/:id/complete", post(mark_complete))
        .route("/api/admin/resources", post(upload_resource))
        .route("/api/admin/resources/:id", delete(delete_resource))
        .route("/api/admin/resources/:id/ingest", post(ingest_resource))
}
