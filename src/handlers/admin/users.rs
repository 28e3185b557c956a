//! Administrative user and course-access management.

use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AuthUser;
use crate::models::{AuditAction, GrantOutcome, GrantedBy, User, UserPurchases};
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::AuditLogBuilder;

pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<User>>> {
    let conn = state.db.get()?;
    let limit = pagination.limit();
    let offset = pagination.offset();
    let (items, total) = queries::list_users_paginated(&conn, limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub purchased_courses: Vec<String>,
    pub purchased_bundles: Vec<String>,
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserDetail>> {
    let conn = state.db.get()?;
    let user = queries::get_user_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let UserPurchases {
        purchased_courses,
        purchased_bundles,
        ..
    } = queries::get_user_purchases(&conn, &id)?;
    Ok(Json(UserDetail {
        user,
        purchased_courses,
        purchased_bundles,
    }))
}

/// Admin grant of course access. Also appends to the purchase mirror so
/// `check_purchase` (which only reads the mirror) sees admin grants too.
pub async fn grant_course_access(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path((user_id, course_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let course = {
        let conn = state.db.get()?;

        queries::get_user_by_id(&conn, &user_id)?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        let course = queries::get_course_by_id(&conn, &course_id)?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

        let outcome =
            queries::grant_course_access(&conn, &user_id, &course, GrantedBy::Admin)?;
        if outcome == GrantOutcome::AlreadyEnrolled {
            return Err(AppError::Conflict("User is already enrolled".into()));
        }
        course
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::GrantAccess)
            .resource("course", &course_id)
            .title(course.title.display())
            .details(&serde_json::json!({ "user_id": user_id }))
            .save();
    }

    Ok(Json(serde_json::json!({ "granted": true })))
}

pub async fn revoke_course_access(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path((user_id, course_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let course = {
        let conn = state.db.get()?;
        let course = queries::get_course_by_id(&conn, &course_id)?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
        queries::revoke_course_access(&conn, &user_id, &course_id)?;
        course
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::RevokeAccess)
            .resource("course", &course_id)
            .title(course.title.display())
            .details(&serde_json::json!({ "user_id": user_id }))
            .save();
    }

    Ok(Json(serde_json::json!({ "revoked": true })))
}
