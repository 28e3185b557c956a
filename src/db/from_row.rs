//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! Models implement `FromRow` to define how they are constructed from
//! database rows; `query_one`/`query_all` handle the common patterns.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Read a LocalizedText JSON column.
fn localized(row: &Row, col: usize) -> rusqlite::Result<LocalizedText> {
    Ok(LocalizedText::from_json(&row.get::<_, String>(col)?))
}

/// Read an optional LocalizedText JSON column.
fn localized_opt(row: &Row, col: usize) -> rusqlite::Result<Option<LocalizedText>> {
    Ok(row
        .get::<_, Option<String>>(col)?
        .map(|s| LocalizedText::from_json(&s)))
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const COURSE_COLS: &str = "id, slug, title, description, price_cents, category, level, status, is_public, current_version, thumbnail_key, total_enrollments, archived_at, archive_reason, archive_grace_until, created_at, updated_at";

pub const COURSE_VERSION_COLS: &str = "id, course_id, version_number, title, description, price_cents, level, status, is_public, thumbnail_key, change_log, created_at";

pub const VIDEO_COLS: &str = "id, course_id, version_number, title, blob_key, size_bytes, mime_type, display_order, created_at";

pub const MATERIAL_COLS: &str = VIDEO_COLS;

pub const BUNDLE_COLS: &str = "id, slug, title, description, price_cents, status, is_public, thumbnail_key, total_enrollments, archived_at, archive_reason, archive_grace_until, created_at, updated_at";

pub const USER_COLS: &str = "id, email, name, role, created_at, updated_at";

pub const ENROLLMENT_COLS: &str =
    "id, item_type, item_id, user_id, granted_by, status, version_enrolled, enrolled_at";

pub const PAYMENT_COLS: &str = "id, session_id, user_id, course_id, bundle_id, amount_cents, currency, status, payment_method, item_title, user_email, created_at, updated_at";

pub const CERTIFICATE_COLS: &str = "id, user_id, course_id, course_title, blob_key, issued_at";

pub const PROGRESS_COLS: &str =
    "id, user_id, course_id, version_number, completed_videos, percent, updated_at";

pub const AUDIT_LOG_COLS: &str = "id, timestamp, action, resource_type, resource_id, resource_title, performed_by, details, deletion_summary, ip_address, user_agent";

// ============ FromRow Implementations ============

impl FromRow for Course {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Course {
            id: row.get(0)?,
            slug: row.get(1)?,
            title: localized(row, 2)?,
            description: localized_opt(row, 3)?,
            price_cents: row.get(4)?,
            category: parse_enum(row, 5, "category")?,
            level: parse_enum(row, 6, "level")?,
            status: parse_enum(row, 7, "status")?,
            is_public: row.get::<_, i32>(8)? != 0,
            current_version: row.get(9)?,
            thumbnail_key: row.get(10)?,
            total_enrollments: row.get(11)?,
            archived_at: row.get(12)?,
            archive_reason: row.get(13)?,
            archive_grace_until: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }
}

impl FromRow for CourseVersion {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CourseVersion {
            id: row.get(0)?,
            course_id: row.get(1)?,
            version_number: row.get(2)?,
            title: localized(row, 3)?,
            description: localized_opt(row, 4)?,
            price_cents: row.get(5)?,
            level: parse_enum(row, 6, "level")?,
            status: parse_enum(row, 7, "status")?,
            is_public: row.get::<_, i32>(8)? != 0,
            thumbnail_key: row.get(9)?,
            change_log: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

impl FromRow for Video {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Video {
            id: row.get(0)?,
            course_id: row.get(1)?,
            version_number: row.get(2)?,
            title: row.get(3)?,
            blob_key: row.get(4)?,
            size_bytes: row.get(5)?,
            mime_type: row.get(6)?,
            display_order: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for Material {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Material {
            id: row.get(0)?,
            course_id: row.get(1)?,
            version_number: row.get(2)?,
            title: row.get(3)?,
            blob_key: row.get(4)?,
            size_bytes: row.get(5)?,
            mime_type: row.get(6)?,
            display_order: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for Bundle {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Bundle {
            id: row.get(0)?,
            slug: row.get(1)?,
            title: localized(row, 2)?,
            description: localized_opt(row, 3)?,
            price_cents: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            is_public: row.get::<_, i32>(6)? != 0,
            thumbnail_key: row.get(7)?,
            total_enrollments: row.get(8)?,
            archived_at: row.get(9)?,
            archive_reason: row.get(10)?,
            archive_grace_until: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            role: parse_enum(row, 3, "role")?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for Enrollment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Enrollment {
            id: row.get(0)?,
            item_type: parse_enum(row, 1, "item_type")?,
            item_id: row.get(2)?,
            user_id: row.get(3)?,
            granted_by: parse_enum(row, 4, "granted_by")?,
            status: parse_enum(row, 5, "status")?,
            version_enrolled: row.get(6)?,
            enrolled_at: row.get(7)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            session_id: row.get(1)?,
            user_id: row.get(2)?,
            course_id: row.get(3)?,
            bundle_id: row.get(4)?,
            amount_cents: row.get(5)?,
            currency: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            payment_method: row.get(8)?,
            item_title: row.get(9)?,
            user_email: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl FromRow for Certificate {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Certificate {
            id: row.get(0)?,
            user_id: row.get(1)?,
            course_id: row.get(2)?,
            course_title: row.get(3)?,
            blob_key: row.get(4)?,
            issued_at: row.get(5)?,
        })
    }
}

impl FromRow for Progress {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let completed: String = row.get(4)?;
        Ok(Progress {
            id: row.get(0)?,
            user_id: row.get(1)?,
            course_id: row.get(2)?,
            version_number: row.get(3)?,
            completed_videos: serde_json::from_str(&completed).unwrap_or_default(),
            percent: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for AuditLog {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let details: Option<String> = row.get(7)?;
        let deletion_summary: Option<String> = row.get(8)?;
        Ok(AuditLog {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            action: row.get(2)?,
            resource_type: row.get(3)?,
            resource_id: row.get(4)?,
            resource_title: row.get(5)?,
            performed_by: row.get(6)?,
            details: details.and_then(|s| serde_json::from_str(&s).ok()),
            deletion_summary: deletion_summary.and_then(|s| serde_json::from_str(&s).ok()),
            ip_address: row.get(9)?,
            user_agent: row.get(10)?,
        })
    }
}
