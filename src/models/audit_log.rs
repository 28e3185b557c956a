use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Administrative and destructive actions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    CreateCourse,
    UpdateCourse,
    DeactivateCourse,
    ReactivateCourse,
    ArchiveCourse,
    UnarchiveCourse,
    DeleteCourse,
    CreateVersion,
    UploadVideo,
    UploadMaterial,
    UploadThumbnail,
    CreateBundle,
    UpdateBundle,
    ArchiveBundle,
    UnarchiveBundle,
    DeleteBundle,
    GrantAccess,
    RevokeAccess,
    PurchaseCompleted,
    DevPurchase,
}

/// One append-only audit row. There are no update or delete operations
/// on this table anywhere in the codebase.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub id: String,
    pub timestamp: i64,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    /// Display title of the resource at the time of the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_title: Option<String>,
    /// User id of the actor, or "system" for webhook-driven writes.
    pub performed_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Structured counts summary, present for deletions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_summary: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub performed_by: Option<String>,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
    /// Maximum number of items to return (default: 50, max: 100)
    pub limit: Option<i64>,
    /// Number of items to skip (default: 0)
    pub offset: Option<i64>,
}

impl AuditLogQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
