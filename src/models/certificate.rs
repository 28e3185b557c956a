use serde::Serialize;

/// Proof of completion for a user+course.
///
/// Certificates carry a snapshot of the course title and only a
/// back-reference to the course id: their lifetime is independent of the
/// course's, and no deletion path in this codebase touches them.
#[derive(Debug, Clone, Serialize)]
pub struct Certificate {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub course_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_key: Option<String>,
    pub issued_at: i64,
}
