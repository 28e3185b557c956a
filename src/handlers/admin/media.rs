//! Multipart media uploads: videos, materials, thumbnails.
//!
//! Files are validated against a MIME allow-list and size ceiling, then
//! stored under deterministic keys derived from the course slug and the
//! targeted version. Thumbnail upload is not a version-worthy change;
//! only video/material add/remove is.

use axum::extract::{Extension, Multipart, State};
use axum::http::HeaderMap;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::{
    AuditAction, Course, Material, Video, IMAGE_MIME_TYPES, MATERIAL_MIME_TYPES, MAX_IMAGE_BYTES,
    MAX_MATERIAL_BYTES, MAX_VIDEO_BYTES, VIDEO_MIME_TYPES,
};
use crate::storage::{object_key, validate_upload, BlobStorage};
use crate::util::AuditLogBuilder;

/// One file pulled out of a multipart body, plus an optional title field.
struct UploadedFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
    title: Option<String>,
}

async fn read_multipart(mut multipart: Multipart) -> Result<UploadedFile> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut title: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("title") => {
                title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Invalid title field: {}", e)))?,
                );
            }
            _ => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some((file_name, content_type, bytes.to_vec()));
            }
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| AppError::BadRequest("No file in request".into()))?;
    Ok(UploadedFile {
        file_name,
        content_type,
        bytes,
        title,
    })
}

/// Load the course and verify the targeted version exists.
fn load_target(
    state: &AppState,
    course_id: &str,
    version: i64,
) -> Result<Course> {
    let conn = state.db.get()?;
    let course = queries::get_course_by_id(&conn, course_id)?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
    queries::get_version(&conn, course_id, version)?
        .ok_or_else(|| AppError::NotFound("Course version not found".into()))?;
    Ok(course)
}

fn storage_of(state: &AppState) -> Result<&BlobStorage> {
    state
        .storage
        .as_deref()
        .ok_or_else(|| AppError::Dependency("Blob storage not configured".into()))
}

pub async fn upload_video(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path((course_id, version)): Path<(String, i64)>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Video>> {
    let course = load_target(&state, &course_id, version)?;
    let upload = read_multipart(multipart).await?;
    validate_upload(
        &upload.content_type,
        upload.bytes.len() as i64,
        VIDEO_MIME_TYPES,
        MAX_VIDEO_BYTES,
    )?;

    let key = object_key(&course.slug, version, "videos", &upload.file_name);
    let size = upload.bytes.len() as i64;
    storage_of(&state)?
        .upload(&key, upload.bytes, &upload.content_type)
        .await?;

    let video = {
        let conn = state.db.get()?;
        queries::create_video(
            &conn,
            &course_id,
            version,
            upload.title.as_deref(),
            &key,
            size,
            &upload.content_type,
        )?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::UploadVideo)
            .resource("course", &course_id)
            .title(course.title.display())
            .details(&serde_json::json!({
                "video_id": video.id,
                "version": version,
                "size_bytes": size,
            }))
            .save();
    }

    Ok(Json(video))
}

pub async fn upload_material(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path((course_id, version)): Path<(String, i64)>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Material>> {
    let course = load_target(&state, &course_id, version)?;
    let upload = read_multipart(multipart).await?;
    validate_upload(
        &upload.content_type,
        upload.bytes.len() as i64,
        MATERIAL_MIME_TYPES,
        MAX_MATERIAL_BYTES,
    )?;

    let key = object_key(&course.slug, version, "materials", &upload.file_name);
    let size = upload.bytes.len() as i64;
    storage_of(&state)?
        .upload(&key, upload.bytes, &upload.content_type)
        .await?;

    let material = {
        let conn = state.db.get()?;
        queries::create_material(
            &conn,
            &course_id,
            version,
            upload.title.as_deref(),
            &key,
            size,
            &upload.content_type,
        )?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::UploadMaterial)
            .resource("course", &course_id)
            .title(course.title.display())
            .details(&serde_json::json!({
                "material_id": material.id,
                "version": version,
                "size_bytes": size,
            }))
            .save();
    }

    Ok(Json(material))
}

#[derive(Debug, Serialize)]
pub struct ThumbnailResponse {
    pub blob_key: String,
}

/// Upload a version's thumbnail, mirrored onto the course row when the
/// targeted version is current.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path((course_id, version)): Path<(String, i64)>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ThumbnailResponse>> {
    let course = load_target(&state, &course_id, version)?;
    let upload = read_multipart(multipart).await?;
    validate_upload(
        &upload.content_type,
        upload.bytes.len() as i64,
        IMAGE_MIME_TYPES,
        MAX_IMAGE_BYTES,
    )?;

    let key = object_key(&course.slug, version, "thumbnails", &upload.file_name);
    storage_of(&state)?
        .upload(&key, upload.bytes, &upload.content_type)
        .await?;

    {
        let mut conn = state.db.get()?;
        queries::set_thumbnail(&mut conn, &course, version, &key)?;
    }

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::UploadThumbnail)
            .resource("course", &course_id)
            .title(course.title.display())
            .details(&serde_json::json!({ "version": version }))
            .save();
    }

    Ok(Json(ThumbnailResponse { blob_key: key }))
}
