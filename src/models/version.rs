use serde::{Deserialize, Serialize};

use super::course::{CourseLevel, CourseStatus};
use super::localized::LocalizedText;

/// Snapshot of a course's content at a version number.
///
/// Versions are append-only: a new version never mutates an older one.
/// Media (videos/materials) attach to a (course, version_number) pair,
/// so a fresh version starts empty until uploads target it.
#[derive(Debug, Clone, Serialize)]
pub struct CourseVersion {
    pub id: String,
    pub course_id: String,
    pub version_number: i64,
    pub title: LocalizedText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedText>,
    pub price_cents: i64,
    pub level: CourseLevel,
    pub status: CourseStatus,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_log: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateVersionRequest {
    #[serde(default)]
    pub change_log: Option<String>,
}
