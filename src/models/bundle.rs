use serde::{Deserialize, Serialize};

use super::course::CourseStatus;
use super::localized::LocalizedText;
use crate::error::{AppError, Result};

/// A priced grouping of one or more courses.
///
/// The course reference set is non-owning: deleting a course pulls it out
/// of every bundle, deleting a bundle never touches its courses.
#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    pub id: String,
    pub slug: String,
    pub title: LocalizedText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedText>,
    pub price_cents: i64,
    pub status: CourseStatus,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,
    pub total_enrollments: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_grace_until: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Bundle {
    pub fn is_purchasable(&self) -> bool {
        self.status == CourseStatus::Active
    }
}

/// A bundle together with its member course ids, in display order.
#[derive(Debug, Serialize)]
pub struct BundleWithCourses {
    #[serde(flatten)]
    pub bundle: Bundle,
    pub course_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBundle {
    pub title: LocalizedText,
    #[serde(default)]
    pub description: Option<LocalizedText>,
    pub price_cents: i64,
    /// Must be non-empty; every id must reference an existing course.
    pub course_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

impl CreateBundle {
    pub fn validate(&self) -> Result<()> {
        let mut offending = Vec::new();

        if self.title.is_blank() {
            offending.push("title".to_string());
        }
        if self.price_cents < 0 {
            offending.push("price_cents".to_string());
        }
        if self.course_ids.is_empty() {
            offending.push("course_ids".to_string());
        }

        if offending.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(offending))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBundle {
    pub title: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub price_cents: Option<i64>,
    /// Replaces the member set when present. May be empty: an emptied
    /// bundle is forced inactive.
    pub course_ids: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

impl UpdateBundle {
    pub fn validate(&self) -> Result<()> {
        let mut offending = Vec::new();

        if let Some(ref title) = self.title {
            if title.is_blank() {
                offending.push("title".to_string());
            }
        }
        if let Some(price) = self.price_cents {
            if price < 0 {
                offending.push("price_cents".to_string());
            }
        }

        if offending.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(offending))
        }
    }
}
