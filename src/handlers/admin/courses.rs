//! Course lifecycle: create, update, status transitions, archival.

use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AuthUser;
use crate::models::{
    ArchiveCourseRequest, AuditAction, Course, CreateCourse, Enrollment, ItemType, UpdateCourse,
};
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::AuditLogBuilder;

pub async fn create_course(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    headers: HeaderMap,
    Json(input): Json<CreateCourse>,
) -> Result<Json<Course>> {
    let course = {
        let mut conn = state.db.get()?;
        queries::create_course(&mut conn, &input)?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::CreateCourse)
            .resource("course", &course.id)
            .title(course.title.display())
            .details(&serde_json::json!({
                "category": course.category,
                "level": course.level,
                "price_cents": course.price_cents,
            }))
            .save();
    }

    Ok(Json(course))
}

pub async fn list_all_courses(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<Course>>> {
    let conn = state.db.get()?;
    let limit = pagination.limit();
    let offset = pagination.offset();
    let (items, total) = queries::list_courses_paginated(&conn, limit, offset, false)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

/// Admin view of a course: the row plus its enrollment list.
#[derive(Debug, Serialize)]
pub struct CourseAdminView {
    #[serde(flatten)]
    pub course: Course,
    pub enrolled_students: Vec<Enrollment>,
}

pub async fn get_course_admin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseAdminView>> {
    let conn = state.db.get()?;
    let course = queries::get_course_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
    let enrolled_students = queries::list_enrollments_for_item(&conn, ItemType::Course, &id)?;
    Ok(Json(CourseAdminView {
        course,
        enrolled_students,
    }))
}

pub async fn update_course(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<UpdateCourse>,
) -> Result<Json<Course>> {
    let course = {
        let mut conn = state.db.get()?;
        let existing = queries::get_course_by_id(&conn, &id)?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
        queries::update_course(&mut conn, &existing, &input)?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::UpdateCourse)
            .resource("course", &course.id)
            .title(course.title.display())
            .save();
    }

    Ok(Json(course))
}

pub async fn deactivate_course(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Course>> {
    let course = {
        let conn = state.db.get()?;
        queries::deactivate_course(&conn, &id)?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::DeactivateCourse)
            .resource("course", &course.id)
            .title(course.title.display())
            .save();
    }

    Ok(Json(course))
}

pub async fn reactivate_course(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Course>> {
    let course = {
        let conn = state.db.get()?;
        queries::reactivate_course(&conn, &id)?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::ReactivateCourse)
            .resource("course", &course.id)
            .title(course.title.display())
            .save();
    }

    Ok(Json(course))
}

pub async fn archive_course(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<ArchiveCourseRequest>,
) -> Result<Json<Course>> {
    let (course, version_numbers) = {
        let mut conn = state.db.get()?;
        let course =
            queries::archive_course(&mut conn, &id, &input.reason, input.grace_period_months)?;
        let versions = queries::list_versions(&conn, &id)?
            .into_iter()
            .map(|v| v.version_number)
            .collect::<Vec<_>>();
        (course, versions)
    };

    // Blob-side archival is advisory: spawn it and move on. Failures are
    // logged inside; they never block or fail the archive.
    if let Some(storage) = state.storage.clone() {
        let slug = course.slug.clone();
        tokio::spawn(async move {
            for version in version_numbers {
                storage
                    .archive_prefix_best_effort(&format!("courses/{}/v{}/", slug, version))
                    .await;
            }
        });
    }

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::ArchiveCourse)
            .resource("course", &course.id)
            .title(course.title.display())
            .details(&serde_json::json!({
                "reason": input.reason,
                "grace_period_months": input.grace_period_months,
            }))
            .save();
    }

    Ok(Json(course))
}

pub async fn unarchive_course(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Course>> {
    let course = {
        let mut conn = state.db.get()?;
        queries::unarchive_course(&mut conn, &id)?
    };

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(&admin.user_id)
            .action(AuditAction::UnarchiveCourse)
            .resource("course", &course.id)
            .title(course.title.display())
            .save();
    }

    Ok(Json(course))
}
