//! Shared utility functions for the Coursedesk application.

use axum::http::HeaderMap;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::AuditAction;

/// Turn a display title into a URL/blob-key safe slug.
///
/// Non-ASCII characters (Tajik titles) are dropped rather than
/// transliterated; the caller falls back to "untitled" for empty results.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_matches('-').to_string();
    slug.chars().take(64).collect()
}

/// Extract client IP address and user-agent from request headers.
///
/// Tries `x-forwarded-for` first (for proxied requests), then `x-real-ip`,
/// and extracts the `user-agent` header for audit logging.
pub fn extract_request_info(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    (ip, user_agent)
}

/// Builder for creating audit log entries.
///
/// # Example
/// ```ignore
/// AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
///     .actor(&user.id)
///     .action(AuditAction::DeleteCourse)
///     .resource("course", &course.id)
///     .title(course.title.display())
///     .deletion_summary(&serde_json::to_value(&summary)?)
///     .save();
/// ```
pub struct AuditLogBuilder<'a> {
    conn: &'a Connection,
    enabled: bool,
    headers: Option<&'a HeaderMap>,
    performed_by: &'a str,
    action: AuditAction,
    resource_type: &'a str,
    resource_id: &'a str,
    resource_title: Option<String>,
    details: Option<&'a serde_json::Value>,
    deletion_summary: Option<&'a serde_json::Value>,
}

impl<'a> AuditLogBuilder<'a> {
    pub fn new(conn: &'a Connection, enabled: bool, headers: &'a HeaderMap) -> Self {
        Self {
            conn,
            enabled,
            headers: Some(headers),
            performed_by: "system",
            action: AuditAction::CreateCourse, // Placeholder, should always be set
            resource_type: "",
            resource_id: "",
            resource_title: None,
            details: None,
            deletion_summary: None,
        }
    }

    /// Builder for writes with no originating HTTP request (webhooks).
    pub fn without_request(conn: &'a Connection, enabled: bool) -> Self {
        Self {
            conn,
            enabled,
            headers: None,
            performed_by: "system",
            action: AuditAction::PurchaseCompleted,
            resource_type: "",
            resource_id: "",
            resource_title: None,
            details: None,
            deletion_summary: None,
        }
    }

    /// User id of the actor ("system" when unset).
    pub fn actor(mut self, performed_by: &'a str) -> Self {
        self.performed_by = performed_by;
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = action;
        self
    }

    pub fn resource(mut self, resource_type: &'a str, resource_id: &'a str) -> Self {
        self.resource_type = resource_type;
        self.resource_id = resource_id;
        self
    }

    /// Display title of the resource at the time of the action.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.resource_title = Some(title.into());
        self
    }

    pub fn details(mut self, details: &'a serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Structured counts summary for deletions.
    pub fn deletion_summary(mut self, summary: &'a serde_json::Value) -> Self {
        self.deletion_summary = Some(summary);
        self
    }

    /// Write the entry. Failures are logged and swallowed: audit is
    /// best-effort observability, never a correctness gate for the
    /// triggering operation.
    pub fn save(self) {
        let (ip, ua) = self
            .headers
            .map(extract_request_info)
            .unwrap_or((None, None));
        if let Err(e) = queries::create_audit_log(
            self.conn,
            self.enabled,
            self.action,
            self.resource_type,
            self.resource_id,
            self.resource_title.as_deref(),
            self.performed_by,
            self.details,
            self.deletion_summary,
            ip.as_deref(),
            ua.as_deref(),
        ) {
            tracing::warn!(
                "Failed to write audit log ({} {}): {}",
                self.action.as_ref(),
                self.resource_id,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Intro to Trading"), "intro-to-trading");
        assert_eq!(slugify("  Rust 101!  "), "rust-101");
        assert_eq!(slugify("a--b__c"), "a-b-c");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Тиҷорат"), "");
        assert_eq!(slugify("Курс: Trading"), "trading");
    }

    #[test]
    fn test_slugify_truncates() {
        let long = "x".repeat(200);
        assert_eq!(slugify(&long).len(), 64);
    }
}
