//! Course version management.

use axum::extract::{Extension, State};
use axum::http::HeaderMap;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::{AuditAction, CourseVersion, CreateVersionRequest};
use crate::util::AuditLogBuilder;

pub async fn list_versions(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<CourseVersion>>> {
    let conn = state.db.get()?;
    queries::get_course_by_id(&conn, &course_id)?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
    Ok(Json(queries::list_versions(&conn, &course_id)?))
}

/// Create version N+1 snapshotting the course's current metadata. Media do
/// not carry over; the new version starts empty.
pub async fn create_new_version(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(course_id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<CreateVersionRequest>,
) -> Result<Json<CourseVersion>> {
    let version = {
        let mut conn = state.db.get()?;
        let course = queries::get_course_by_id(&conn, &course_id)?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
        queries::create_new_version(&mut conn, &course, input.change_log.as_deref())?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::CreateVersion)
            .resource("course", &course_id)
            .title(version.title.display())
            .details(&serde_json::json!({
                "version_number": version.version_number,
                "change_log": input.change_log,
            }))
            .save();
    }

    Ok(Json(version))
}
