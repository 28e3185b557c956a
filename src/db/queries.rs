use chrono::{Months, Utc};
use rusqlite::{params, types::Value, Connection};

use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;
use crate::util::slugify;

use super::from_row::{
    query_all, query_one, FromRow, AUDIT_LOG_COLS, BUNDLE_COLS, CERTIFICATE_COLS, COURSE_COLS,
    COURSE_VERSION_COLS, ENROLLMENT_COLS, MATERIAL_COLS, PAYMENT_COLS, PROGRESS_COLS, USER_COLS,
    VIDEO_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

/// True when the error is a unique-constraint violation, the signal that
/// an idempotent insert lost a race it is allowed to lose.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============ Courses ============

/// Generate a unique slug from the display title, suffixing a counter
/// on collision.
fn unique_slug(conn: &Connection, table: &str, title: &str) -> Result<String> {
    let base = slugify(title);
    let base = if base.is_empty() {
        "untitled".to_string()
    } else {
        base
    };

    let mut candidate = base.clone();
    let mut n = 1;
    loop {
        let exists: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE slug = ?1)", table),
            params![&candidate],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(candidate);
        }
        n += 1;
        candidate = format!("{}-{}", base, n);
    }
}

/// Create a course at version 1 together with its CourseVersion(1) row,
/// in one transaction.
pub fn create_course(conn: &mut Connection, input: &CreateCourse) -> Result<Course> {
    let (category, level) = input.validate()?;

    let id = EntityType::Course.gen_id();
    let now = now();
    let slug = unique_slug(conn, "courses", input.title.display())?;
    let description_json = input.description.as_ref().map(|d| d.to_json());

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO courses (id, slug, title, description, price_cents, category, level, status, is_public, current_version, total_enrollments, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8, 1, 0, ?9, ?9)",
        params![
            &id,
            &slug,
            input.title.to_json(),
            description_json,
            input.price_cents,
            category.as_ref(),
            level.as_ref(),
            input.is_public as i64,
            now
        ],
    )?;
    insert_version_row(&tx, &id, 1, input, level, None, now)?;
    tx.commit()?;

    get_course_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal("Course missing after create".into()))
}

fn insert_version_row(
    conn: &Connection,
    course_id: &str,
    version_number: i64,
    input: &CreateCourse,
    level: CourseLevel,
    change_log: Option<&str>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO course_versions (id, course_id, version_number, title, description, price_cents, level, status, is_public, change_log, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8, ?9, ?10)",
        params![
            EntityType::CourseVersion.gen_id(),
            course_id,
            version_number,
            input.title.to_json(),
            input.description.as_ref().map(|d| d.to_json()),
            input.price_cents,
            level.as_ref(),
            input.is_public as i64,
            change_log,
            now
        ],
    )?;
    Ok(())
}

pub fn get_course_by_id(conn: &Connection, id: &str) -> Result<Option<Course>> {
    query_one(
        conn,
        &format!("SELECT {} FROM courses WHERE id = ?1", COURSE_COLS),
        &[&id],
    )
}

pub fn get_course_by_slug(conn: &Connection, slug: &str) -> Result<Option<Course>> {
    query_one(
        conn,
        &format!("SELECT {} FROM courses WHERE slug = ?1", COURSE_COLS),
        &[&slug],
    )
}

/// Paginated course listing. `public_only` restricts to the public
/// catalog view (active + is_public).
pub fn list_courses_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
    public_only: bool,
) -> Result<(Vec<Course>, i64)> {
    let filter = if public_only {
        "WHERE status = 'active' AND is_public = 1"
    } else {
        ""
    };
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM courses {}", filter),
        [],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM courses {} ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            COURSE_COLS, filter
        ),
        &[&limit, &offset],
    )?;
    Ok((items, total))
}

/// Whitelist partial update, mirrored onto the current version row.
///
/// Title/description/price/level/is_public changes are not version-worthy;
/// only media add/remove is. The mirror keeps "current" reads join-free.
pub fn update_course(
    conn: &mut Connection,
    course: &Course,
    input: &UpdateCourse,
) -> Result<Option<Course>> {
    input.validate()?;

    let tx = conn.transaction()?;

    let updated = {
        let mut builder = UpdateBuilder::new("courses", &course.id).with_updated_at();
        builder = builder
            .set_opt("title", input.title.as_ref().map(|t| t.to_json()))
            .set_opt("description", input.description.as_ref().map(|d| d.to_json()))
            .set_opt("price_cents", input.price_cents)
            .set_opt("category", input.category.clone())
            .set_opt("level", input.level.clone())
            .set_opt("is_public", input.is_public.map(i64::from));
        builder.execute(&tx)?
    };

    if updated {
        // Mirror onto the current version snapshot.
        let mut sets = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(ref title) = input.title {
            sets.push("title = ?");
            values.push(title.to_json().into());
        }
        if let Some(ref description) = input.description {
            sets.push("description = ?");
            values.push(description.to_json().into());
        }
        if let Some(price) = input.price_cents {
            sets.push("price_cents = ?");
            values.push(price.into());
        }
        if let Some(ref level) = input.level {
            sets.push("level = ?");
            values.push(level.clone().into());
        }
        if let Some(is_public) = input.is_public {
            sets.push("is_public = ?");
            values.push(i64::from(is_public).into());
        }
        if !sets.is_empty() {
            values.push(course.id.clone().into());
            values.push(course.current_version.into());
            tx.execute(
                &format!(
                    "UPDATE course_versions SET {} WHERE course_id = ? AND version_number = ?",
                    sets.join(", ")
                ),
                rusqlite::params_from_iter(values),
            )?;
        }
    }

    tx.commit()?;

    if updated {
        get_course_by_id(conn, &course.id)
    } else {
        Ok(Some(course.clone()))
    }
}

/// `active -> inactive`. Fails with Conflict when already inactive.
pub fn deactivate_course(conn: &Connection, id: &str) -> Result<Course> {
    let affected = conn.execute(
        "UPDATE courses SET status = 'inactive', is_public = 0, updated_at = ?2
         WHERE id = ?1 AND status = 'active'",
        params![id, now()],
    )?;
    if affected == 0 {
        return match get_course_by_id(conn, id)? {
            None => Err(AppError::NotFound("Course not found".into())),
            Some(_) => Err(AppError::Conflict("Course is not active".into())),
        };
    }
    get_course_by_id(conn, id)?
        .ok_or_else(|| AppError::Internal("Course missing after deactivate".into()))
}

/// `inactive -> active`. Fails with Conflict when not inactive.
pub fn reactivate_course(conn: &Connection, id: &str) -> Result<Course> {
    let affected = conn.execute(
        "UPDATE courses SET status = 'active', is_public = 1, updated_at = ?2
         WHERE id = ?1 AND status = 'inactive'",
        params![id, now()],
    )?;
    if affected == 0 {
        return match get_course_by_id(conn, id)? {
            None => Err(AppError::NotFound("Course not found".into())),
            Some(_) => Err(AppError::Conflict("Course is not inactive".into())),
        };
    }
    get_course_by_id(conn, id)?
        .ok_or_else(|| AppError::Internal("Course missing after reactivate".into()))
}

/// Archive a course and every one of its versions in lockstep.
///
/// Blob-side archival is the caller's (best-effort) concern; this only
/// transitions database state.
pub fn archive_course(
    conn: &mut Connection,
    id: &str,
    reason: &str,
    grace_period_months: u32,
) -> Result<Course> {
    let archived_at = Utc::now();
    let grace_until = archived_at
        .checked_add_months(Months::new(grace_period_months))
        .map(|d| d.timestamp());

    let tx = conn.transaction()?;
    let affected = tx.execute(
        "UPDATE courses SET status = 'archived', is_public = 0, archived_at = ?2, archive_reason = ?3, archive_grace_until = ?4, updated_at = ?2
         WHERE id = ?1 AND status != 'archived'",
        params![id, archived_at.timestamp(), reason, grace_until],
    )?;
    if affected == 0 {
        return match get_course_by_id(&tx, id)? {
            None => Err(AppError::NotFound("Course not found".into())),
            Some(_) => Err(AppError::Conflict("Course is already archived".into())),
        };
    }
    tx.execute(
        "UPDATE course_versions SET status = 'archived' WHERE course_id = ?1",
        params![id],
    )?;
    tx.commit()?;

    get_course_by_id(conn, id)?
        .ok_or_else(|| AppError::Internal("Course missing after archive".into()))
}

/// Reverse an archive: course and all archived versions back to active,
/// archive metadata cleared to its pre-archive null state.
pub fn unarchive_course(conn: &mut Connection, id: &str) -> Result<Course> {
    let tx = conn.transaction()?;
    let affected = tx.execute(
        "UPDATE courses SET status = 'active', is_public = 1, archived_at = NULL, archive_reason = NULL, archive_grace_until = NULL, updated_at = ?2
         WHERE id = ?1 AND status = 'archived'",
        params![id, now()],
    )?;
    if affected == 0 {
        return match get_course_by_id(&tx, id)? {
            None => Err(AppError::NotFound("Course not found".into())),
            Some(_) => Err(AppError::Conflict("Course is not archived".into())),
        };
    }
    tx.execute(
        "UPDATE course_versions SET status = 'active' WHERE course_id = ?1 AND status = 'archived'",
        params![id],
    )?;
    tx.commit()?;

    get_course_by_id(conn, id)?
        .ok_or_else(|| AppError::Internal("Course missing after unarchive".into()))
}

// ============ Course versions ============

pub fn max_version_number(conn: &Connection, course_id: &str) -> Result<i64> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version_number), 0) FROM course_versions WHERE course_id = ?1",
        params![course_id],
        |row| row.get(0),
    )?;
    Ok(max)
}

/// Create version N+1 snapshotting the course's current metadata and point
/// the course at it. New versions start with no media.
///
/// Also repairs the recoverable inconsistency of a course whose version
/// rows are missing entirely (N starts from 0).
pub fn create_new_version(
    conn: &mut Connection,
    course: &Course,
    change_log: Option<&str>,
) -> Result<CourseVersion> {
    let next = max_version_number(conn, &course.id)? + 1;
    let now = now();
    let id = EntityType::CourseVersion.gen_id();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO course_versions (id, course_id, version_number, title, description, price_cents, level, status, is_public, change_log, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8, ?9, ?10)",
        params![
            &id,
            &course.id,
            next,
            course.title.to_json(),
            course.description.as_ref().map(|d| d.to_json()),
            course.price_cents,
            course.level.as_ref(),
            course.is_public as i64,
            change_log,
            now
        ],
    )?;
    tx.execute(
        "UPDATE courses SET current_version = ?2, updated_at = ?3 WHERE id = ?1",
        params![&course.id, next, now],
    )?;
    tx.commit()?;

    get_version(conn, &course.id, next)?
        .ok_or_else(|| AppError::Internal("Version missing after create".into()))
}

pub fn get_version(
    conn: &Connection,
    course_id: &str,
    version_number: i64,
) -> Result<Option<CourseVersion>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM course_versions WHERE course_id = ?1 AND version_number = ?2",
            COURSE_VERSION_COLS
        ),
        &[&course_id, &version_number],
    )
}

pub fn list_versions(conn: &Connection, course_id: &str) -> Result<Vec<CourseVersion>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM course_versions WHERE course_id = ?1 ORDER BY version_number",
            COURSE_VERSION_COLS
        ),
        &[&course_id],
    )
}

/// Set a version's thumbnail, mirroring onto the course row when the
/// targeted version is current so catalog reads need no join.
pub fn set_thumbnail(
    conn: &mut Connection,
    course: &Course,
    version_number: i64,
    blob_key: &str,
) -> Result<()> {
    let tx = conn.transaction()?;
    let affected = tx.execute(
        "UPDATE course_versions SET thumbnail_key = ?3 WHERE course_id = ?1 AND version_number = ?2",
        params![&course.id, version_number, blob_key],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound("Course version not found".into()));
    }
    if version_number == course.current_version {
        tx.execute(
            "UPDATE courses SET thumbnail_key = ?2, updated_at = ?3 WHERE id = ?1",
            params![&course.id, blob_key, now()],
        )?;
    }
    tx.commit()?;
    Ok(())
}

// ============ Videos & materials ============

pub fn create_video(
    conn: &Connection,
    course_id: &str,
    version_number: i64,
    title: Option<&str>,
    blob_key: &str,
    size_bytes: i64,
    mime_type: &str,
) -> Result<Video> {
    let id = EntityType::Video.gen_id();
    let order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(display_order) + 1, 0) FROM videos WHERE course_id = ?1 AND version_number = ?2",
        params![course_id, version_number],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO videos (id, course_id, version_number, title, blob_key, size_bytes, mime_type, display_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![&id, course_id, version_number, title, blob_key, size_bytes, mime_type, order, now()],
    )?;
    query_one(
        conn,
        &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLS),
        &[&id],
    )?
    .ok_or_else(|| AppError::Internal("Video missing after create".into()))
}

pub fn create_material(
    conn: &Connection,
    course_id: &str,
    version_number: i64,
    title: Option<&str>,
    blob_key: &str,
    size_bytes: i64,
    mime_type: &str,
) -> Result<Material> {
    let id = EntityType::Material.gen_id();
    let order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(display_order) + 1, 0) FROM materials WHERE course_id = ?1 AND version_number = ?2",
        params![course_id, version_number],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO materials (id, course_id, version_number, title, blob_key, size_bytes, mime_type, display_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![&id, course_id, version_number, title, blob_key, size_bytes, mime_type, order, now()],
    )?;
    query_one(
        conn,
        &format!("SELECT {} FROM materials WHERE id = ?1", MATERIAL_COLS),
        &[&id],
    )?
    .ok_or_else(|| AppError::Internal("Material missing after create".into()))
}

pub fn list_videos(
    conn: &Connection,
    course_id: &str,
    version_number: i64,
) -> Result<Vec<Video>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM videos WHERE course_id = ?1 AND version_number = ?2 ORDER BY display_order",
            VIDEO_COLS
        ),
        &[&course_id, &version_number],
    )
}

pub fn list_materials(
    conn: &Connection,
    course_id: &str,
    version_number: i64,
) -> Result<Vec<Material>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM materials WHERE course_id = ?1 AND version_number = ?2 ORDER BY display_order",
            MATERIAL_COLS
        ),
        &[&course_id, &version_number],
    )
}

// ============ Bundles ============

pub fn create_bundle(conn: &mut Connection, input: &CreateBundle) -> Result<BundleWithCourses> {
    input.validate()?;

    let id = EntityType::Bundle.gen_id();
    let now = now();
    let slug = unique_slug(conn, "bundles", input.title.display())?;

    let tx = conn.transaction()?;

    for course_id in &input.course_ids {
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM courses WHERE id = ?1)",
            params![course_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::NotFound(format!("Course not found: {}", course_id)));
        }
    }

    tx.execute(
        "INSERT INTO bundles (id, slug, title, description, price_cents, status, is_public, total_enrollments, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, 0, ?7, ?7)",
        params![
            &id,
            &slug,
            input.title.to_json(),
            input.description.as_ref().map(|d| d.to_json()),
            input.price_cents,
            input.is_public as i64,
            now
        ],
    )?;
    for (position, course_id) in input.course_ids.iter().enumerate() {
        tx.execute(
            "INSERT OR IGNORE INTO bundle_courses (bundle_id, course_id, position) VALUES (?1, ?2, ?3)",
            params![&id, course_id, position as i64],
        )?;
    }
    tx.commit()?;

    get_bundle_with_courses(conn, &id)?
        .ok_or_else(|| AppError::Internal("Bundle missing after create".into()))
}

pub fn get_bundle_by_id(conn: &Connection, id: &str) -> Result<Option<Bundle>> {
    query_one(
        conn,
        &format!("SELECT {} FROM bundles WHERE id = ?1", BUNDLE_COLS),
        &[&id],
    )
}

pub fn bundle_course_ids(conn: &Connection, bundle_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT course_id FROM bundle_courses WHERE bundle_id = ?1 ORDER BY position")?;
    let ids = stmt
        .query_map(params![bundle_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn get_bundle_with_courses(conn: &Connection, id: &str) -> Result<Option<BundleWithCourses>> {
    let Some(bundle) = get_bundle_by_id(conn, id)? else {
        return Ok(None);
    };
    let course_ids = bundle_course_ids(conn, id)?;
    Ok(Some(BundleWithCourses { bundle, course_ids }))
}

pub fn list_bundles_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
    public_only: bool,
) -> Result<(Vec<Bundle>, i64)> {
    let filter = if public_only {
        "WHERE status = 'active' AND is_public = 1"
    } else {
        ""
    };
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM bundles {}", filter),
        [],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM bundles {} ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            BUNDLE_COLS, filter
        ),
        &[&limit, &offset],
    )?;
    Ok((items, total))
}

/// Partial bundle update. When `course_ids` is present the member set is
/// replaced; emptying it forces the bundle inactive.
pub fn update_bundle(
    conn: &mut Connection,
    bundle: &Bundle,
    input: &UpdateBundle,
) -> Result<BundleWithCourses> {
    input.validate()?;

    let tx = conn.transaction()?;

    {
        let builder = UpdateBuilder::new("bundles", &bundle.id)
            .with_updated_at()
            .set_opt("title", input.title.as_ref().map(|t| t.to_json()))
            .set_opt("description", input.description.as_ref().map(|d| d.to_json()))
            .set_opt("price_cents", input.price_cents)
            .set_opt("is_public", input.is_public.map(i64::from));
        builder.execute(&tx)?;
    }

    if let Some(ref course_ids) = input.course_ids {
        for course_id in course_ids {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM courses WHERE id = ?1)",
                params![course_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(AppError::NotFound(format!("Course not found: {}", course_id)));
            }
        }
        tx.execute(
            "DELETE FROM bundle_courses WHERE bundle_id = ?1",
            params![&bundle.id],
        )?;
        for (position, course_id) in course_ids.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO bundle_courses (bundle_id, course_id, position) VALUES (?1, ?2, ?3)",
                params![&bundle.id, course_id, position as i64],
            )?;
        }
        if course_ids.is_empty() {
            tx.execute(
                "UPDATE bundles SET status = 'inactive', is_public = 0, updated_at = ?2 WHERE id = ?1",
                params![&bundle.id, now()],
            )?;
        }
    }

    tx.commit()?;

    get_bundle_with_courses(conn, &bundle.id)?
        .ok_or_else(|| AppError::Internal("Bundle missing after update".into()))
}

pub fn archive_bundle(
    conn: &Connection,
    id: &str,
    reason: &str,
    grace_period_months: u32,
) -> Result<Bundle> {
    let archived_at = Utc::now();
    let grace_until = archived_at
        .checked_add_months(Months::new(grace_period_months))
        .map(|d| d.timestamp());

    let affected = conn.execute(
        "UPDATE bundles SET status = 'archived', is_public = 0, archived_at = ?2, archive_reason = ?3, archive_grace_until = ?4, updated_at = ?2
         WHERE id = ?1 AND status != 'archived'",
        params![id, archived_at.timestamp(), reason, grace_until],
    )?;
    if affected == 0 {
        return match get_bundle_by_id(conn, id)? {
            None => Err(AppError::NotFound("Bundle not found".into())),
            Some(_) => Err(AppError::Conflict("Bundle is already archived".into())),
        };
    }
    get_bundle_by_id(conn, id)?
        .ok_or_else(|| AppError::Internal("Bundle missing after archive".into()))
}

pub fn unarchive_bundle(conn: &Connection, id: &str) -> Result<Bundle> {
    let affected = conn.execute(
        "UPDATE bundles SET status = 'active', is_public = 1, archived_at = NULL, archive_reason = NULL, archive_grace_until = NULL, updated_at = ?2
         WHERE id = ?1 AND status = 'archived'",
        params![id, now()],
    )?;
    if affected == 0 {
        return match get_bundle_by_id(conn, id)? {
            None => Err(AppError::NotFound("Bundle not found".into())),
            Some(_) => Err(AppError::Conflict("Bundle is not archived".into())),
        };
    }
    get_bundle_by_id(conn, id)?
        .ok_or_else(|| AppError::Internal("Bundle missing after unarchive".into()))
}

/// Counts returned by a bundle delete.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BundleDeletion {
    pub bundle_id: String,
    pub title: String,
    pub member_courses: i64,
    pub enrollments_removed: i64,
    pub purchases_scrubbed: i64,
}

/// Permanently delete a bundle: bundle enrollments and purchase mirrors
/// go, the member courses (and their enrollments) stay. A user who bought
/// the bundle keeps the per-course access granted at purchase time.
pub fn delete_bundle_cascade(conn: &mut Connection, bundle: &Bundle) -> Result<BundleDeletion> {
    let tx = conn.transaction()?;

    let member_courses = tx.execute(
        "DELETE FROM bundle_courses WHERE bundle_id = ?1",
        params![&bundle.id],
    )? as i64;
    let enrollments_removed = tx.execute(
        "DELETE FROM enrollments WHERE item_type = 'bundle' AND item_id = ?1",
        params![&bundle.id],
    )? as i64;
    let purchases_scrubbed = tx.execute(
        "DELETE FROM user_purchases WHERE item_type = 'bundle' AND item_id = ?1",
        params![&bundle.id],
    )? as i64;
    tx.execute("DELETE FROM bundles WHERE id = ?1", params![&bundle.id])?;

    tx.commit()?;

    Ok(BundleDeletion {
        bundle_id: bundle.id.clone(),
        title: bundle.title.display().to_string(),
        member_courses,
        enrollments_removed,
        purchases_scrubbed,
    })
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = EntityType::User.gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id, &email, &input.name, input.role.as_ref(), now],
    )?;

    get_user_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal("User missing after create".into()))
}

/// Mirror an externally-authenticated identity into the users table.
/// No-op when the row already exists.
pub fn ensure_user(conn: &Connection, id: &str, email: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO users (id, email, name, role, created_at, updated_at)
         VALUES (?1, ?2, NULL, 'student', ?3, ?3)",
        params![id, email.trim().to_lowercase(), now()],
    )?;
    Ok(())
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

/// Promote the user with the given email to admin. Returns false when no
/// such user exists yet (they must authenticate once first).
pub fn promote_admin_by_email(conn: &Connection, email: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET role = 'admin', updated_at = ?2 WHERE email = ?1",
        params![email.trim().to_lowercase(), now()],
    )?;
    Ok(affected > 0)
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

pub fn list_users_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM users ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            USER_COLS
        ),
        &[&limit, &offset],
    )?;
    Ok((items, total))
}

pub fn get_user_purchases(conn: &Connection, user_id: &str) -> Result<UserPurchases> {
    let mut stmt = conn.prepare(
        "SELECT item_type, item_id FROM user_purchases WHERE user_id = ?1 ORDER BY purchased_at",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut purchases = UserPurchases {
        user_id: user_id.to_string(),
        purchased_courses: Vec::new(),
        purchased_bundles: Vec::new(),
    };
    for (item_type, item_id) in rows {
        match item_type.as_str() {
            "course" => purchases.purchased_courses.push(item_id),
            _ => purchases.purchased_bundles.push(item_id),
        }
    }
    Ok(purchases)
}

// ============ Entitlements ============

/// Fast-path ownership check against the denormalized purchase mirror.
/// Deliberately never consults the authoritative enrollments table.
pub fn has_purchased(
    conn: &Connection,
    user_id: &str,
    item_type: ItemType,
    item_id: &str,
) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_purchases WHERE user_id = ?1 AND item_type = ?2 AND item_id = ?3)",
        params![user_id, item_type.as_ref(), item_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Mirror a grant into the denormalized purchase list (set semantics).
pub fn add_purchase(
    conn: &Connection,
    user_id: &str,
    item_type: ItemType,
    item_id: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_purchases (user_id, item_type, item_id, purchased_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, item_type.as_ref(), item_id, now()],
    )?;
    Ok(())
}

/// Idempotent entitlement grant. The unique index on
/// (item_type, item_id, user_id) makes the losing writer of a
/// double-purchase race observe `AlreadyEnrolled` instead of duplicating
/// the enrollment or the counter bump.
pub fn grant_entitlement(
    conn: &Connection,
    item_type: ItemType,
    item_id: &str,
    user_id: &str,
    granted_by: GrantedBy,
    version_enrolled: Option<i64>,
) -> Result<GrantOutcome> {
    let result = conn.execute(
        "INSERT INTO enrollments (id, item_type, item_id, user_id, granted_by, status, version_enrolled, enrolled_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?7)",
        params![
            EntityType::Enrollment.gen_id(),
            item_type.as_ref(),
            item_id,
            user_id,
            granted_by.as_ref(),
            version_enrolled,
            now()
        ],
    );

    match result {
        Ok(_) => {
            bump_enrollment_counter(conn, item_type, item_id)?;
            Ok(GrantOutcome::Enrolled)
        }
        Err(e) if is_unique_violation(&e) => {
            // A revoked enrollment is reinstated rather than treated as a
            // duplicate; an active one is the no-op replay case.
            let reinstated = conn.execute(
                "UPDATE enrollments SET status = 'active', granted_by = ?4, enrolled_at = ?5
                 WHERE item_type = ?1 AND item_id = ?2 AND user_id = ?3 AND status = 'revoked'",
                params![item_type.as_ref(), item_id, user_id, granted_by.as_ref(), now()],
            )?;
            if reinstated > 0 {
                bump_enrollment_counter(conn, item_type, item_id)?;
                Ok(GrantOutcome::Enrolled)
            } else {
                Ok(GrantOutcome::AlreadyEnrolled)
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn bump_enrollment_counter(conn: &Connection, item_type: ItemType, item_id: &str) -> Result<()> {
    let table = match item_type {
        ItemType::Course => "courses",
        ItemType::Bundle => "bundles",
    };
    conn.execute(
        &format!(
            "UPDATE {} SET total_enrollments = total_enrollments + 1 WHERE id = ?1",
            table
        ),
        params![item_id],
    )?;
    Ok(())
}

/// Grant course access and mirror it into the purchase list.
pub fn grant_course_access(
    conn: &Connection,
    user_id: &str,
    course: &Course,
    granted_by: GrantedBy,
) -> Result<GrantOutcome> {
    let outcome = grant_entitlement(
        conn,
        ItemType::Course,
        &course.id,
        user_id,
        granted_by,
        Some(course.current_version),
    )?;
    add_purchase(conn, user_id, ItemType::Course, &course.id)?;
    Ok(outcome)
}

/// Grant bundle access: the bundle itself plus a cascade-enroll into every
/// member course. Pre-existing member enrollments are tolerated as no-ops,
/// which is what makes webhook replays and overlapping bundles safe.
pub fn grant_bundle_access(
    conn: &Connection,
    user_id: &str,
    bundle: &Bundle,
    granted_by: GrantedBy,
) -> Result<GrantOutcome> {
    let outcome = grant_entitlement(conn, ItemType::Bundle, &bundle.id, user_id, granted_by, None)?;
    add_purchase(conn, user_id, ItemType::Bundle, &bundle.id)?;

    for course_id in bundle_course_ids(conn, &bundle.id)? {
        if let Some(course) = get_course_by_id(conn, &course_id)? {
            // Already-enrolled is fine here: the user may own a member
            // course from an earlier direct purchase.
            let _ = grant_course_access(conn, user_id, &course, granted_by)?;
        }
    }
    Ok(outcome)
}

/// Revoke admin-or-payment granted course access: enrollment marked
/// revoked, purchase mirror scrubbed, counter decremented.
pub fn revoke_course_access(conn: &Connection, user_id: &str, course_id: &str) -> Result<()> {
    let affected = conn.execute(
        "UPDATE enrollments SET status = 'revoked'
         WHERE item_type = 'course' AND item_id = ?1 AND user_id = ?2 AND status = 'active'",
        params![course_id, user_id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound("Active enrollment not found".into()));
    }
    conn.execute(
        "UPDATE courses SET total_enrollments = MAX(total_enrollments - 1, 0) WHERE id = ?1",
        params![course_id],
    )?;
    conn.execute(
        "DELETE FROM user_purchases WHERE user_id = ?1 AND item_type = 'course' AND item_id = ?2",
        params![user_id, course_id],
    )?;
    Ok(())
}

pub fn list_enrollments_for_item(
    conn: &Connection,
    item_type: ItemType,
    item_id: &str,
) -> Result<Vec<Enrollment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM enrollments WHERE item_type = ?1 AND item_id = ?2 ORDER BY enrolled_at",
            ENROLLMENT_COLS
        ),
        &[&item_type.as_ref(), &item_id],
    )
}

pub fn get_enrollment(
    conn: &Connection,
    item_type: ItemType,
    item_id: &str,
    user_id: &str,
) -> Result<Option<Enrollment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM enrollments WHERE item_type = ?1 AND item_id = ?2 AND user_id = ?3",
            ENROLLMENT_COLS
        ),
        &[&item_type.as_ref(), &item_id, &user_id],
    )
}

// ============ Payments ============

/// Upsert the payment ledger row by session id.
///
/// This is what makes the webhook handler safe under at-least-once
/// delivery: a replay updates the same row instead of inserting a second.
pub fn upsert_payment(conn: &Connection, input: &UpsertPayment) -> Result<Payment> {
    let now = now();
    conn.execute(
        "INSERT INTO payments (id, session_id, user_id, course_id, bundle_id, amount_cents, currency, status, payment_method, item_title, user_email, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
         ON CONFLICT(session_id) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at",
        params![
            EntityType::Payment.gen_id(),
            &input.session_id,
            &input.user_id,
            &input.course_id,
            &input.bundle_id,
            input.amount_cents,
            &input.currency,
            input.status.as_ref(),
            &input.payment_method,
            &input.item_title,
            &input.user_email,
            now
        ],
    )?;
    get_payment_by_session(conn, &input.session_id)?
        .ok_or_else(|| AppError::Internal("Payment missing after upsert".into()))
}

pub fn get_payment_by_session(conn: &Connection, session_id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE session_id = ?1", PAYMENT_COLS),
        &[&session_id],
    )
}

/// The most recent completed payment for (user, item), if any.
pub fn find_completed_payment(
    conn: &Connection,
    user_id: &str,
    item_type: ItemType,
    item_id: &str,
) -> Result<Option<Payment>> {
    let column = match item_type {
        ItemType::Course => "course_id",
        ItemType::Bundle => "bundle_id",
    };
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE user_id = ?1 AND {} = ?2 AND status = 'completed' ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLS, column
        ),
        &[&user_id, &item_id],
    )
}

pub fn list_payments_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Payment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE user_id = ?1 ORDER BY created_at DESC",
            PAYMENT_COLS
        ),
        &[&user_id],
    )
}

// ============ Certificates ============

pub fn create_certificate(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    course_title: &str,
    blob_key: Option<&str>,
) -> Result<Certificate> {
    let id = EntityType::Certificate.gen_id();
    let result = conn.execute(
        "INSERT INTO certificates (id, user_id, course_id, course_title, blob_key, issued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, user_id, course_id, course_title, blob_key, now()],
    );
    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict(
                "Certificate already issued for this course".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    }
    query_one(
        conn,
        &format!("SELECT {} FROM certificates WHERE id = ?1", CERTIFICATE_COLS),
        &[&id],
    )?
    .ok_or_else(|| AppError::Internal("Certificate missing after create".into()))
}

pub fn list_certificates_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Certificate>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM certificates WHERE user_id = ?1 ORDER BY issued_at DESC",
            CERTIFICATE_COLS
        ),
        &[&user_id],
    )
}

pub fn count_certificates_for_course(conn: &Connection, course_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM certificates WHERE course_id = ?1",
        params![course_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============ Progress ============

pub fn upsert_progress(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    version_number: i64,
    completed_videos: &[String],
    percent: i64,
) -> Result<Progress> {
    let completed_json = serde_json::to_string(completed_videos)?;
    conn.execute(
        "INSERT INTO progress (id, user_id, course_id, version_number, completed_videos, percent, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(user_id, course_id) DO UPDATE SET
             version_number = excluded.version_number,
             completed_videos = excluded.completed_videos,
             percent = excluded.percent,
             updated_at = excluded.updated_at",
        params![
            EntityType::Progress.gen_id(),
            user_id,
            course_id,
            version_number,
            completed_json,
            percent.clamp(0, 100),
            now()
        ],
    )?;
    get_progress(conn, user_id, course_id)?
        .ok_or_else(|| AppError::Internal("Progress missing after upsert".into()))
}

pub fn get_progress(conn: &Connection, user_id: &str, course_id: &str) -> Result<Option<Progress>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM progress WHERE user_id = ?1 AND course_id = ?2",
            PROGRESS_COLS
        ),
        &[&user_id, &course_id],
    )
}

// ============ Course deletion ============

/// Every blob object a course delete would remove: course + version
/// thumbnails and all media, deduplicated. Certificate blobs are
/// deliberately absent.
pub fn collect_course_blob_keys(conn: &Connection, course: &Course) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::new();
    if let Some(ref key) = course.thumbnail_key {
        keys.push(key.clone());
    }

    let mut stmt = conn.prepare(
        "SELECT thumbnail_key FROM course_versions WHERE course_id = ?1 AND thumbnail_key IS NOT NULL",
    )?;
    let version_thumbs = stmt
        .query_map(params![&course.id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    keys.extend(version_thumbs);

    let mut stmt = conn.prepare("SELECT blob_key FROM videos WHERE course_id = ?1")?;
    let video_keys = stmt
        .query_map(params![&course.id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    keys.extend(video_keys);

    let mut stmt = conn.prepare("SELECT blob_key FROM materials WHERE course_id = ?1")?;
    let material_keys = stmt
        .query_map(params![&course.id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    keys.extend(material_keys);

    keys.sort();
    keys.dedup();
    Ok(keys)
}

fn bundle_impacts(conn: &Connection, course_id: &str) -> Result<Vec<BundleImpact>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.title,
                (SELECT COUNT(*) FROM bundle_courses bc2 WHERE bc2.bundle_id = b.id) AS member_count
         FROM bundles b
         JOIN bundle_courses bc ON bc.bundle_id = b.id
         WHERE bc.course_id = ?1",
    )?;
    let impacts = stmt
        .query_map(params![course_id], |row| {
            let title_json: String = row.get(1)?;
            let member_count: i64 = row.get(2)?;
            Ok(BundleImpact {
                bundle_id: row.get(0)?,
                title: LocalizedText::from_json(&title_json).display().to_string(),
                will_become_inactive: member_count <= 1,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(impacts)
}

fn count_rows(conn: &Connection, sql: &str, course_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(sql, params![course_id], |row| row.get(0))?;
    Ok(count)
}

/// Read-only projection of exactly what a permanent delete would remove.
/// Backs the confirmation UI; mutates nothing.
pub fn get_deletion_summary(conn: &Connection, course: &Course) -> Result<DeletionSummary> {
    Ok(DeletionSummary {
        course_id: course.id.clone(),
        title: course.title.display().to_string(),
        versions: count_rows(
            conn,
            "SELECT COUNT(*) FROM course_versions WHERE course_id = ?1",
            &course.id,
        )?,
        videos: count_rows(
            conn,
            "SELECT COUNT(*) FROM videos WHERE course_id = ?1",
            &course.id,
        )?,
        materials: count_rows(
            conn,
            "SELECT COUNT(*) FROM materials WHERE course_id = ?1",
            &course.id,
        )?,
        certificates_preserved: count_certificates_for_course(conn, &course.id)?,
        progress_records: count_rows(
            conn,
            "SELECT COUNT(*) FROM progress WHERE course_id = ?1",
            &course.id,
        )?,
        affected_users: count_rows(
            conn,
            "SELECT COUNT(*) FROM user_purchases WHERE item_type = 'course' AND item_id = ?1",
            &course.id,
        )?,
        affected_bundles: bundle_impacts(conn, &course.id)?,
        blob_objects: collect_course_blob_keys(conn, course)?.len() as i64,
    })
}

/// Permanently delete a course and every dependent row in one database
/// transaction. Certificates are never touched.
///
/// Blob objects are NOT deleted here: the caller performs best-effort
/// blob cleanup before calling, outside the transaction, so a rollback
/// never needs to compensate an external system.
pub fn delete_course_cascade(conn: &mut Connection, course: &Course) -> Result<DeletionSummary> {
    // Pre-compute the pieces the transaction itself cannot count.
    let certificates_preserved = count_certificates_for_course(conn, &course.id)?;
    let affected_bundles = bundle_impacts(conn, &course.id)?;
    let blob_objects = collect_course_blob_keys(conn, course)?.len() as i64;

    let tx = conn.transaction()?;

    let progress_records = tx.execute(
        "DELETE FROM progress WHERE course_id = ?1",
        params![&course.id],
    )? as i64;
    let videos = tx.execute(
        "DELETE FROM videos WHERE course_id = ?1",
        params![&course.id],
    )? as i64;
    let materials = tx.execute(
        "DELETE FROM materials WHERE course_id = ?1",
        params![&course.id],
    )? as i64;
    let versions = tx.execute(
        "DELETE FROM course_versions WHERE course_id = ?1",
        params![&course.id],
    )? as i64;
    tx.execute(
        "DELETE FROM enrollments WHERE item_type = 'course' AND item_id = ?1",
        params![&course.id],
    )?;
    let affected_users = tx.execute(
        "DELETE FROM user_purchases WHERE item_type = 'course' AND item_id = ?1",
        params![&course.id],
    )? as i64;

    // Pull the course out of every bundle; a bundle left with zero
    // courses is no longer sellable.
    tx.execute(
        "DELETE FROM bundle_courses WHERE course_id = ?1",
        params![&course.id],
    )?;
    for impact in &affected_bundles {
        if impact.will_become_inactive {
            tx.execute(
                "UPDATE bundles SET status = 'inactive', is_public = 0, updated_at = ?2 WHERE id = ?1",
                params![&impact.bundle_id, now()],
            )?;
        }
    }

    tx.execute("DELETE FROM courses WHERE id = ?1", params![&course.id])?;

    // Certificates referencing this course stay, by invariant. Nothing
    // here may touch the certificates table.

    tx.commit()?;

    Ok(DeletionSummary {
        course_id: course.id.clone(),
        title: course.title.display().to_string(),
        versions,
        videos,
        materials,
        certificates_preserved,
        progress_records,
        affected_users,
        affected_bundles,
        blob_objects,
    })
}

// ============ Audit logs (separate database) ============

/// Append one audit row. Callers treat failures as non-fatal; see
/// `util::AuditLogBuilder` for the swallow-and-warn wrapper.
#[allow(clippy::too_many_arguments)]
pub fn create_audit_log(
    conn: &Connection,
    enabled: bool,
    action: AuditAction,
    resource_type: &str,
    resource_id: &str,
    resource_title: Option<&str>,
    performed_by: &str,
    details: Option<&serde_json::Value>,
    deletion_summary: Option<&serde_json::Value>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<AuditLog> {
    let id = EntityType::AuditLog.gen_id();
    let timestamp = now();

    if enabled {
        conn.execute(
            "INSERT INTO audit_logs (id, timestamp, action, resource_type, resource_id, resource_title, performed_by, details, deletion_summary, ip_address, user_agent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                &id,
                timestamp,
                action.as_ref(),
                resource_type,
                resource_id,
                resource_title,
                performed_by,
                details.map(|d| d.to_string()),
                deletion_summary.map(|d| d.to_string()),
                ip_address,
                user_agent
            ],
        )?;
    }

    Ok(AuditLog {
        id,
        timestamp,
        action: action.as_ref().to_string(),
        resource_type: resource_type.to_string(),
        resource_id: resource_id.to_string(),
        resource_title: resource_title.map(String::from),
        performed_by: performed_by.to_string(),
        details: details.cloned(),
        deletion_summary: deletion_summary.cloned(),
        ip_address: ip_address.map(String::from),
        user_agent: user_agent.map(String::from),
    })
}

pub fn list_audit_logs(conn: &Connection, query: &AuditLogQuery) -> Result<(Vec<AuditLog>, i64)> {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(ref action) = query.action {
        conditions.push("action = ?".into());
        values.push(action.clone().into());
    }
    if let Some(ref resource_type) = query.resource_type {
        conditions.push("resource_type = ?".into());
        values.push(resource_type.clone().into());
    }
    if let Some(ref resource_id) = query.resource_id {
        conditions.push("resource_id = ?".into());
        values.push(resource_id.clone().into());
    }
    if let Some(ref performed_by) = query.performed_by {
        conditions.push("performed_by = ?".into());
        values.push(performed_by.clone().into());
    }
    if let Some(from) = query.from_timestamp {
        conditions.push("timestamp >= ?".into());
        values.push(from.into());
    }
    if let Some(to) = query.to_timestamp {
        conditions.push("timestamp <= ?".into());
        values.push(to.into());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM audit_logs {}", where_clause),
        rusqlite::params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    values.push(query.limit().into());
    values.push(query.offset().into());
    let sql = format!(
        "SELECT {} FROM audit_logs {} ORDER BY timestamp DESC LIMIT ? OFFSET ?",
        AUDIT_LOG_COLS, where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(rusqlite::params_from_iter(values), AuditLog::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((items, total))
}
