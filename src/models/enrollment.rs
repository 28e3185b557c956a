use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemType {
    Course,
    Bundle,
}

/// Provenance of a granted entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GrantedBy {
    Payment,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Revoked,
}

/// The authoritative record of a granted entitlement.
///
/// At most one enrollment exists per (item, user); the unique index on
/// (item_type, item_id, user_id) is what makes concurrent double-purchase
/// attempts collapse into a single grant.
#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub id: String,
    pub item_type: ItemType,
    pub item_id: String,
    pub user_id: String,
    pub granted_by: GrantedBy,
    pub status: EnrollmentStatus,
    /// Course version current at enrollment time (courses only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_enrolled: Option<i64>,
    pub enrolled_at: i64,
}

/// Outcome of an idempotent grant attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// A new enrollment was created.
    Enrolled,
    /// The user was already enrolled; nothing changed.
    AlreadyEnrolled,
}
