//! Prefixed ID generation for Coursedesk entities.
//!
//! All IDs use a `cd_` brand prefix to guarantee collision avoidance with
//! payment provider IDs (Stripe's `cs_`, `pi_`, `cus_`, etc.).
//!
//! Format: `cd_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &[
    "cd_crs_", "cd_ver_", "cd_vid_", "cd_mat_", "cd_bnd_", "cd_usr_", "cd_enr_", "cd_pay_",
    "cd_cert_", "cd_prg_", "cd_aud_",
];

/// Validate that a string is a valid Coursedesk prefixed ID.
///
/// Cheap format check to reject garbage before hitting the database.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in Coursedesk.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Course,
    CourseVersion,
    Video,
    Material,
    Bundle,
    User,
    Enrollment,
    Payment,
    Certificate,
    Progress,
    AuditLog,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Course => "cd_crs",
            Self::CourseVersion => "cd_ver",
            Self::Video => "cd_vid",
            Self::Material => "cd_mat",
            Self::Bundle => "cd_bnd",
            Self::User => "cd_usr",
            Self::Enrollment => "cd_enr",
            Self::Payment => "cd_pay",
            Self::Certificate => "cd_cert",
            Self::Progress => "cd_prg",
            Self::AuditLog => "cd_aud",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
