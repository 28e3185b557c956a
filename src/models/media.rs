use serde::Serialize;

/// A video owned by exactly one course and one version number.
///
/// The blob object lives in the object store under `blob_key`; the row
/// is deleted after a best-effort delete of the blob.
#[derive(Debug, Clone, Serialize)]
pub struct Video {
    pub id: String,
    pub course_id: String,
    pub version_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub blob_key: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub display_order: i64,
    pub created_at: i64,
}

/// A downloadable material (PDF, archive, ...) owned by one course+version.
#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub id: String,
    pub course_id: String,
    pub version_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub blob_key: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub display_order: i64,
    pub created_at: i64,
}

/// MIME types accepted for video uploads.
pub const VIDEO_MIME_TYPES: &[&str] = &["video/mp4", "video/webm", "video/quicktime"];
/// MIME types accepted for thumbnail uploads.
pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];
/// MIME types accepted for material uploads.
pub const MATERIAL_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/zip",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
];

pub const MAX_VIDEO_BYTES: i64 = 500 * 1024 * 1024;
pub const MAX_IMAGE_BYTES: i64 = 5 * 1024 * 1024;
pub const MAX_MATERIAL_BYTES: i64 = 50 * 1024 * 1024;
