//! Bundle lifecycle: create, update, archive, delete.

use axum::extract::{Extension, State};
use axum::http::HeaderMap;

use crate::db::queries::BundleDeletion;
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AuthUser;
use crate::models::{
    ArchiveCourseRequest, AuditAction, Bundle, BundleWithCourses, CreateBundle, UpdateBundle,
};
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::AuditLogBuilder;

pub async fn create_bundle(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    headers: HeaderMap,
    Json(input): Json<CreateBundle>,
) -> Result<Json<BundleWithCourses>> {
    let bundle = {
        let mut conn = state.db.get()?;
        queries::create_bundle(&mut conn, &input)?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::CreateBundle)
            .resource("bundle", &bundle.bundle.id)
            .title(bundle.bundle.title.display())
            .details(&serde_json::json!({
                "course_ids": bundle.course_ids,
                "price_cents": bundle.bundle.price_cents,
            }))
            .save();
    }

    Ok(Json(bundle))
}

pub async fn list_all_bundles(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<Bundle>>> {
    let conn = state.db.get()?;
    let limit = pagination.limit();
    let offset = pagination.offset();
    let (items, total) = queries::list_bundles_paginated(&conn, limit, offset, false)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

pub async fn get_bundle_admin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BundleWithCourses>> {
    let conn = state.db.get()?;
    queries::get_bundle_with_courses(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("Bundle not found".into()))
        .map(Json)
}

pub async fn update_bundle(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<UpdateBundle>,
) -> Result<Json<BundleWithCourses>> {
    let bundle = {
        let mut conn = state.db.get()?;
        let existing = queries::get_bundle_by_id(&conn, &id)?
            .ok_or_else(|| AppError::NotFound("Bundle not found".into()))?;
        queries::update_bundle(&mut conn, &existing, &input)?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::UpdateBundle)
            .resource("bundle", &bundle.bundle.id)
            .title(bundle.bundle.title.display())
            .save();
    }

    Ok(Json(bundle))
}

pub async fn archive_bundle(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<ArchiveCourseRequest>,
) -> Result<Json<Bundle>> {
    let bundle = {
        let conn = state.db.get()?;
        queries::archive_bundle(&conn, &id, &input.reason, input.grace_period_months)?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::ArchiveBundle)
            .resource("bundle", &bundle.id)
            .title(bundle.title.display())
            .details(&serde_json::json!({ "reason": input.reason }))
            .save();
    }

    Ok(Json(bundle))
}

pub async fn unarchive_bundle(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Bundle>> {
    let bundle = {
        let conn = state.db.get()?;
        queries::unarchive_bundle(&conn, &id)?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::UnarchiveBundle)
            .resource("bundle", &bundle.id)
            .title(bundle.title.display())
            .save();
    }

    Ok(Json(bundle))
}

/// Delete a bundle. The thumbnail blob goes best-effort first; member
/// courses and the per-course enrollments bundle buyers received are
/// deliberately untouched.
pub async fn delete_bundle(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<BundleDeletion>> {
    let bundle = {
        let conn = state.db.get()?;
        queries::get_bundle_by_id(&conn, &id)?
            .ok_or_else(|| AppError::NotFound("Bundle not found".into()))?
    };

    if let (Some(storage), Some(key)) = (&state.storage, &bundle.thumbnail_key) {
        if let Err(e) = storage.delete(key).await {
            tracing::warn!("Bundle thumbnail delete failed (continuing): {}", e);
        }
    }

    let deletion = {
        let mut conn = state.db.get()?;
        queries::delete_bundle_cascade(&mut conn, &bundle)?
    };

    if let Ok(audit_conn) = state.audit.get() {
        let details = serde_json::to_value(&deletion).unwrap_or_default();
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::DeleteBundle)
            .resource("bundle", &bundle.id)
            .title(bundle.title.display())
            .deletion_summary(&details)
            .save();
    }

    Ok(Json(deletion))
}
