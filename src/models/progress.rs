use serde::{Deserialize, Serialize};

/// A user's progress through a course version.
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub version_number: i64,
    /// Ids of completed videos.
    pub completed_videos: Vec<String>,
    pub percent: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpsertProgress {
    pub course_id: String,
    pub completed_videos: Vec<String>,
    pub percent: i64,
}
