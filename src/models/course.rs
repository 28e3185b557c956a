use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::localized::LocalizedText;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CourseCategory {
    Trading,
    Programming,
    Design,
    Marketing,
    Language,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CourseStatus {
    Active,
    Inactive,
    Archived,
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: String,
    pub slug: String,
    pub title: LocalizedText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedText>,
    pub price_cents: i64,
    pub category: CourseCategory,
    pub level: CourseLevel,
    pub status: CourseStatus,
    pub is_public: bool,
    pub current_version: i64,
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

impl Course {
    /// Whether the course can be sold right now.
    pub fn is_purchasable(&self) -> bool {
        self.status == CourseStatus::Active
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCourse {
    pub title: LocalizedText,
    #[serde(default)]
    pub description: Option<LocalizedText>,
    pub price_cents: i64,
    /// Validated against the closed [`CourseCategory`] enum.
    pub category: String,
    /// Validated against the closed [`CourseLevel`] enum.
    pub level: String,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

impl CreateCourse {
    /// Validate required fields and closed enums, collecting every
    /// offending field so the client sees them all at once.
    pub fn validate(&self) -> Result<(CourseCategory, CourseLevel)> {
        let mut offending = Vec::new();

        if self.title.is_blank() {
            offending.push("title".to_string());
        }
        if self.price_cents < 0 {
            offending.push("price_cents".to_string());
        }
        let category = self.category.parse::<CourseCategory>();
        if category.is_err() {
            offending.push("category".to_string());
        }
        let level = self.level.parse::<CourseLevel>();
        if level.is_err() {
            offending.push("level".to_string());
        }

        if !offending.is_empty() {
            return Err(AppError::Validation(offending));
        }

        // Both parses succeeded or we returned above.
        Ok((category.unwrap(), level.unwrap()))
    }
}

/// Whitelist partial update. Fields absent from the request are untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCourse {
    pub title: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub price_cents: Option<i64>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub is_public: Option<bool>,
}

impl UpdateCourse {
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
        if let Some(ref category) = self.category {
            if category.parse::<CourseCategory>().is_err() {
                offending.push("category".to_string());
            }
        }
        if let Some(ref level) = self.level {
            if level.parse::<CourseLevel>().is_err() {
                offending.push("level".to_string());
            }
        }

        if offending.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(offending))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ArchiveCourseRequest {
    pub reason: String,
    /// Months until the archived content may be purged (advisory).
    #[serde(default = "default_grace_months")]
    pub grace_period_months: u32,
}

fn default_grace_months() -> u32 {
    6
}

/// Per-bundle impact of deleting a course.
#[derive(Debug, Clone, Serialize)]
pub struct BundleImpact {
    pub bundle_id: String,
    pub title: String,
    /// True when the bundle would lose its last course.
    pub will_become_inactive: bool,
}

/// Read-only projection of what a permanent delete would remove.
/// Also the shape returned by the delete itself, with actual counts.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionSummary {
    pub course_id: String,
    pub title: String,
    pub versions: i64,
    pub videos: i64,
    pub materials: i64,
    /// Certificates referencing this course. Preserved, never deleted.
    pub certificates_preserved: i64,
    pub progress_records: i64,
    /// Users whose purchase list references this course.
    pub affected_users: i64,
    pub affected_bundles: Vec<BundleImpact>,
    /// Blob objects that will be (or were) deleted: thumbnail + media.
    pub blob_objects: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> CreateCourse {
        CreateCourse {
            title: "Intro to Trading".into(),
            description: None,
            price_cents: 4999,
            category: "trading".to_string(),
            level: "beginner".to_string(),
            is_public: true,
        }
    }

    #[test]
    fn test_validate_accepts_closed_enums() {
        let (category, level) = valid_input().validate().expect("input should be valid");
        assert_eq!(category, CourseCategory::Trading);
        assert_eq!(level, CourseLevel::Beginner);
    }

    #[test]
    fn test_validate_lists_every_offending_field() {
        let input = CreateCourse {
            title: "".into(),
            price_cents: -1,
            category: "cooking".to_string(),
            level: "expert".to_string(),
            ..valid_input()
        };
        match input.validate() {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields, vec!["title", "price_cents", "category", "level"]);
            }
            other => panic!("expected validation error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_update_validates_only_present_fields() {
        let update = UpdateCourse {
            level: Some("advanced".to_string()),
            ..Default::default()
        };
        update.validate().expect("present fields are valid");

        let update = UpdateCourse {
            category: Some("gardening".to_string()),
            ..Default::default()
        };
        match update.validate() {
            Err(AppError::Validation(fields)) => assert_eq!(fields, vec!["category"]),
            other => panic!("expected validation error, got {:?}", other.err()),
        }
    }
}
