//! Permanent course deletion and its read-only preview.
//!
//! Ordering is deliberate: blob objects are deleted best-effort BEFORE the
//! database transaction opens. A blob failure never blocks the delete; a
//! database failure rolls back every row but cannot resurrect already
//! deleted blobs. The database is never left partially deleted, the
//! bucket may be.

use axum::extract::{Extension, State};
use axum::http::HeaderMap;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::{AuditAction, DeletionSummary};
use crate::util::AuditLogBuilder;

/// Read-only preview of a permanent delete. Backs the confirmation UI.
pub async fn get_deletion_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletionSummary>> {
    let conn = state.db.get()?;
    let course = queries::get_course_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
    Ok(Json(queries::get_deletion_summary(&conn, &course)?))
}

pub async fn delete_course(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeletionSummary>> {
    let (course, blob_keys) = {
        let conn = state.db.get()?;
        let course = queries::get_course_by_id(&conn, &id)?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
        let keys = queries::collect_course_blob_keys(&conn, &course)?;
        (course, keys)
    };

    // Step 1: best-effort blob cleanup, outside any transaction.
    // Certificate blobs are not in this key set and never will be.
    match &state.storage {
        Some(storage) => {
            let deleted = storage.delete_all_best_effort(&blob_keys).await;
            if deleted < blob_keys.len() {
                tracing::warn!(
                    "Course {}: {}/{} blob objects deleted, rest orphaned",
                    course.id,
                    deleted,
                    blob_keys.len()
                );
            }
        }
        None if !blob_keys.is_empty() => {
            tracing::warn!(
                "Course {}: blob storage unconfigured, orphaning {} objects",
                course.id,
                blob_keys.len()
            );
        }
        None => {}
    }

    // Step 2: one transaction for every row. All-or-nothing.
    let summary = {
        let mut conn = state.db.get()?;
        queries::delete_course_cascade(&mut conn, &course)?
    };

    // Step 3: audit with exact counts, post-commit and best-effort.
    if let Ok(audit_conn) = state.audit.get() {
        let summary_json = serde_json::to_value(&summary).unwrap_or_default();
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::DeleteCourse)
            .resource("course", &course.id)
            .title(course.title.display())
            .deletion_summary(&summary_json)
            .save();
    }

    tracing::info!(
        "Course deleted: id={}, versions={}, videos={}, materials={}, certificates preserved={}",
        course.id,
        summary.versions,
        summary.videos,
        summary.materials,
        summary.certificates_preserved
    );

    Ok(Json(summary))
}
