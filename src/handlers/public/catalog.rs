//! Public catalog: browse active courses and bundles.

use std::time::Duration;

use axum::extract::State;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{Bundle, Course, Material, Video};
use crate::pagination::{Paginated, PaginationQuery};

const THUMBNAIL_URL_TTL: Duration = Duration::from_secs(3600);

/// A course as the catalog shows it: the row plus a resolved thumbnail URL.
#[derive(Debug, Serialize)]
pub struct CourseResponse {
    #[serde(flatten)]
    pub course: Course,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BundleResponse {
    #[serde(flatten)]
    pub bundle: Bundle,
    pub course_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseResponse,
    /// Media of the current version, metadata only. Playback URLs are
    /// issued by the content endpoint, after an ownership check.
    pub videos: Vec<Video>,
    pub materials: Vec<Material>,
}

/// Resolve a thumbnail to a URL: presigned when possible, public formula
/// as fallback. A signing failure degrades the URL, never the request.
pub(crate) async fn resolve_thumbnail(state: &AppState, key: Option<&str>) -> Option<String> {
    let key = key?;
    let storage = state.storage.as_ref()?;
    storage.url_for(key, THUMBNAIL_URL_TTL).await
}

pub async fn list_courses(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<CourseResponse>>> {
    let limit = pagination.limit();
    let offset = pagination.offset();
    let (courses, total) = {
        let conn = state.db.get()?;
        queries::list_courses_paginated(&conn, limit, offset, true)?
    };

    let mut items = Vec::with_capacity(courses.len());
    for course in courses {
        let thumbnail_url = resolve_thumbnail(&state, course.thumbnail_key.as_deref()).await;
        items.push(CourseResponse {
            course,
            thumbnail_url,
        });
    }
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

/// Course detail by id or slug. Inactive/archived courses are not served
/// from the public catalog.
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseDetail>> {
    let (course, videos, materials) = {
        let conn = state.db.get()?;
        let course = match queries::get_course_by_id(&conn, &id)? {
            Some(c) => Some(c),
            None => queries::get_course_by_slug(&conn, &id)?,
        }
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

        if !course.is_public || !course.is_purchasable() {
            return Err(AppError::NotFound("Course not found".into()));
        }

        let videos = queries::list_videos(&conn, &course.id, course.current_version)?;
        let materials = queries::list_materials(&conn, &course.id, course.current_version)?;
        (course, videos, materials)
    };

    let thumbnail_url = resolve_thumbnail(&state, course.thumbnail_key.as_deref()).await;
    Ok(Json(CourseDetail {
        course: CourseResponse {
            course,
            thumbnail_url,
        },
        videos,
        materials,
    }))
}

pub async fn list_bundles(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<BundleResponse>>> {
    let limit = pagination.limit();
    let offset = pagination.offset();
    let (bundles, total) = {
        let conn = state.db.get()?;
        queries::list_bundles_paginated(&conn, limit, offset, true)?
    };

    let mut items = Vec::with_capacity(bundles.len());
    for bundle in bundles {
        let course_ids = {
            let conn = state.db.get()?;
            queries::bundle_course_ids(&conn, &bundle.id)?
        };
        let thumbnail_url = resolve_thumbnail(&state, bundle.thumbnail_key.as_deref()).await;
        items.push(BundleResponse {
            bundle,
            course_ids,
            thumbnail_url,
        });
    }
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

pub async fn get_bundle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BundleResponse>> {
    let with_courses = {
        let conn = state.db.get()?;
        queries::get_bundle_with_courses(&conn, &id)?
            .ok_or_else(|| AppError::NotFound("Bundle not found".into()))?
    };

    if !with_courses.bundle.is_public || !with_courses.bundle.is_purchasable() {
        return Err(AppError::NotFound("Bundle not found".into()));
    }

    let thumbnail_url =
        resolve_thumbnail(&state, with_courses.bundle.thumbnail_key.as_deref()).await;
    Ok(Json(BundleResponse {
        bundle: with_courses.bundle,
        course_ids: with_courses.course_ids,
        thumbnail_url,
    }))
}
