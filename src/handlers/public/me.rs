//! Authenticated buyer surface: certificates, progress, owned content.

use std::time::Duration;

use axum::extract::{Extension, State};
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::{
    Certificate, EnrollmentStatus, ItemType, Material, Progress, UpsertProgress, Video,
};

const MEDIA_URL_TTL: Duration = Duration::from_secs(6 * 3600);

pub async fn list_my_certificates(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Certificate>>> {
    let conn = state.db.get()?;
    let certificates = queries::list_certificates_for_user(&conn, &user.user_id)?;
    Ok(Json(certificates))
}

/// Upsert the caller's own progress. Requires an active enrollment; the
/// record tracks the version the user is enrolled into, not the current one.
pub async fn upsert_my_progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<UpsertProgress>,
) -> Result<Json<Progress>> {
    let conn = state.db.get()?;

    let enrollment =
        queries::get_enrollment(&conn, ItemType::Course, &input.course_id, &user.user_id)?
            .filter(|e| e.status == EnrollmentStatus::Active)
            .ok_or_else(|| AppError::Forbidden("Not enrolled in this course".into()))?;

    let course = queries::get_course_by_id(&conn, &input.course_id)?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

    let version = enrollment
        .version_enrolled
        .unwrap_or(course.current_version);

    let progress = queries::upsert_progress(
        &conn,
        &user.user_id,
        &input.course_id,
        version,
        &input.completed_videos,
        input.percent,
    )?;
    Ok(Json(progress))
}

#[derive(Debug, Serialize)]
pub struct VideoWithUrl {
    #[serde(flatten)]
    pub video: Video,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MaterialWithUrl {
    #[serde(flatten)]
    pub material: Material,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CourseContent {
    pub course_id: String,
    pub version_number: i64,
    pub videos: Vec<VideoWithUrl>,
    pub materials: Vec<MaterialWithUrl>,
}

/// Owned-content access: media of the version the user is enrolled into,
/// with presigned URLs. Requires an active enrollment; enrolled students
/// keep access even when the course is deactivated.
pub async fn course_content(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseContent>> {
    let (version, videos, materials) = {
        let conn = state.db.get()?;

        let enrollment =
            queries::get_enrollment(&conn, ItemType::Course, &course_id, &user.user_id)?
                .filter(|e| e.status == EnrollmentStatus::Active)
                .ok_or_else(|| AppError::Forbidden("Not enrolled in this course".into()))?;

        let course = queries::get_course_by_id(&conn, &course_id)?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

        let version = enrollment
            .version_enrolled
            .unwrap_or(course.current_version);

        let videos = queries::list_videos(&conn, &course_id, version)?;
        let materials = queries::list_materials(&conn, &course_id, version)?;
        (version, videos, materials)
    };

    let mut video_items = Vec::with_capacity(videos.len());
    for video in videos {
        let url = match &state.storage {
            Some(storage) => storage.url_for(&video.blob_key, MEDIA_URL_TTL).await,
            None => None,
        };
        video_items.push(VideoWithUrl { video, url });
    }

    let mut material_items = Vec::with_capacity(materials.len());
    for material in materials {
        let url = match &state.storage {
            Some(storage) => storage.url_for(&material.blob_key, MEDIA_URL_TTL).await,
            None => None,
        };
        material_items.push(MaterialWithUrl { material, url });
    }

    Ok(Json(CourseContent {
        course_id,
        version_number: version,
        videos: video_items,
        materials: material_items,
    }))
}
