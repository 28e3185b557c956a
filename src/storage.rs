//! S3-compatible blob storage for course media.
//!
//! Objects live under deterministic keys derived from the course slug and
//! version (`courses/{slug}/v{n}/...`) so the bucket stays navigable.
//! Deletion and archival are best-effort from the caller's point of view:
//! the database, not the bucket, is the correctness boundary.

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct BlobStorage {
    client: Client,
    bucket: String,
    /// Base for the public URL fallback when presigning fails.
    public_base_url: Option<String>,
}

/// Pure validation of an upload against an allow-list and size ceiling.
/// Lives outside `BlobStorage` so handlers can reject before buffering
/// and tests need no client.
pub fn validate_upload(
    content_type: &str,
    size_bytes: i64,
    allowed_mime_types: &[&str],
    max_bytes: i64,
) -> Result<()> {
    if !allowed_mime_types.contains(&content_type) {
        return Err(AppError::BadRequest(format!(
            "Unsupported content type: {} (allowed: {})",
            content_type,
            allowed_mime_types.join(", ")
        )));
    }
    if size_bytes > max_bytes {
        return Err(AppError::BadRequest(format!(
            "File too large: {} bytes (max {} bytes)",
            size_bytes, max_bytes
        )));
    }
    Ok(())
}

/// Deterministic organizational key for an uploaded object.
/// A random suffix keeps re-uploads from silently overwriting.
pub fn object_key(course_slug: &str, version: i64, kind: &str, file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e)
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
        .to_ascii_lowercase();
    format!(
        "courses/{}/v{}/{}/{}.{}",
        course_slug,
        version,
        kind,
        Uuid::new_v4().as_simple(),
        ext
    )
}

impl BlobStorage {
    /// Build the client. S3-compatible services (MinIO etc.) need the
    /// custom endpoint and path-style addressing.
    pub async fn new(
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
        public_base_url: Option<String>,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region));
        }
        let config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&config);
        if let Some(endpoint_url) = endpoint {
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        tracing::debug!(bucket = %bucket, "blob storage initialized");

        Self {
            client,
            bucket,
            public_base_url,
        }
    }

    pub async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::Dependency(format!("S3 upload failed for {}: {}", key, e)))?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Dependency(format!("S3 delete failed for {}: {}", key, e)))?;
        Ok(())
    }

    /// Delete a set of objects, logging each failure and carrying on.
    /// Returns how many deletes succeeded.
    pub async fn delete_all_best_effort(&self, keys: &[String]) -> usize {
        let mut deleted = 0;
        for key in keys {
            match self.delete(key).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!("Blob delete failed (continuing): {}", e);
                }
            }
        }
        deleted
    }

    /// Presigned GET URL with TTL, falling back to the public URL formula
    /// when signing fails. Returns None only when no fallback exists.
    pub async fn url_for(&self, key: &str, ttl: Duration) -> Option<String> {
        match PresigningConfig::expires_in(ttl) {
            Ok(presigning) => match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presigning)
                .await
            {
                Ok(req) => return Some(req.uri().to_string()),
                Err(e) => {
                    tracing::warn!("Presigning failed for {}: {}", key, e);
                }
            },
            Err(e) => {
                tracing::warn!("Invalid presigning config: {}", e);
            }
        }
        self.public_url(key)
    }

    /// Public URL formula: `{base}/{key}` or `{base}/{bucket}/{key}`
    /// depending on whether the base already names the bucket.
    pub fn public_url(&self, key: &str) -> Option<String> {
        let base = self.public_base_url.as_ref()?;
        let trimmed = base.trim_end_matches('/');
        if trimmed.ends_with(&self.bucket) {
            Some(format!("{}/{}", trimmed, key))
        } else {
            Some(format!("{}/{}/{}", trimmed, self.bucket, key))
        }
    }

    /// Best-effort archival of everything under a prefix: objects are
    /// copied beneath `archive/` and left in place. Failures are logged,
    /// not propagated; archiving is advisory.
    pub async fn archive_prefix_best_effort(&self, prefix: &str) {
        let listed = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await;

        let objects = match listed {
            Ok(output) => output.contents.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Archive listing failed for {}: {}", prefix, e);
                return;
            }
        };

        for object in objects {
            let Some(key) = object.key else { continue };
            let copy_source = format!("{}/{}", self.bucket, key);
            let archive_key = format!("archive/{}", key);
            if let Err(e) = self
                .client
                .copy_object()
                .bucket(&self.bucket)
                .copy_source(&copy_source)
                .key(&archive_key)
                .send()
                .await
            {
                tracing::warn!("Archive copy failed for {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_upload_rejects_bad_mime() {
        let err = validate_upload("text/html", 10, &["video/mp4"], 100).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_validate_upload_rejects_oversize() {
        let err = validate_upload("video/mp4", 101, &["video/mp4"], 100).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_validate_upload_accepts() {
        validate_upload("video/mp4", 100, &["video/mp4"], 100).expect("should pass");
    }

    #[test]
    fn test_object_key_shape() {
        let key = object_key("intro-to-trading", 2, "videos", "lesson 1.MP4");
        assert!(key.starts_with("courses/intro-to-trading/v2/videos/"));
        assert!(key.ends_with(".mp4"));
    }

    #[test]
    fn test_object_key_unknown_extension() {
        let key = object_key("c", 1, "materials", "noext");
        assert!(key.ends_with(".bin"));
        // "noext" has no dot, so rsplit yields the whole name; it must not
        // be treated as an extension when longer than the cap.
        let key = object_key("c", 1, "materials", "weird.$$$");
        assert!(key.ends_with(".bin"));
    }
}
