//! Test utilities and fixtures for Coursedesk integration tests

#![allow(dead_code)]

use rusqlite::Connection;

// Re-export the main library crate
pub use coursedesk::db::{init_audit_db, init_db, queries};
pub use coursedesk::models::*;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create an in-memory test audit database with schema initialized
pub fn setup_test_audit_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory audit database");
    init_audit_db(&conn).expect("Failed to initialize audit schema");
    conn
}

/// Create a test course with sensible defaults
pub fn create_test_course(conn: &mut Connection, title: &str, price_cents: i64) -> Course {
    let input = CreateCourse {
        title: title.into(),
        description: Some("Test description".into()),
        price_cents,
        category: "trading".to_string(),
        level: "beginner".to_string(),
        is_public: true,
    };
    queries::create_course(conn, &input).expect("Failed to create test course")
}

/// Create a test bundle over the given courses
pub fn create_test_bundle(
    conn: &mut Connection,
    title: &str,
    course_ids: Vec<String>,
) -> BundleWithCourses {
    let input = CreateBundle {
        title: title.into(),
        description: None,
        price_cents: 9999,
        course_ids,
        is_public: true,
    };
    queries::create_bundle(conn, &input).expect("Failed to create test bundle")
}

/// Create a test user
pub fn create_test_user(conn: &Connection, email: &str) -> User {
    let input = CreateUser {
        email: email.to_string(),
        name: Some(format!("Test User {}", email)),
        role: UserRole::Student,
    };
    queries::create_user(conn, &input).expect("Failed to create test user")
}

/// Attach a video row to a course version (no blob store involved)
pub fn attach_test_video(conn: &Connection, course_id: &str, version: i64, name: &str) -> Video {
    queries::create_video(
        conn,
        course_id,
        version,
        Some(name),
        &format!("courses/test/v{}/videos/{}.mp4", version, name),
        1024,
        "video/mp4",
    )
    .expect("Failed to create test video")
}

/// Attach a material row to a course version
pub fn attach_test_material(
    conn: &Connection,
    course_id: &str,
    version: i64,
    name: &str,
) -> Material {
    queries::create_material(
        conn,
        course_id,
        version,
        Some(name),
        &format!("courses/test/v{}/materials/{}.pdf", version, name),
        512,
        "application/pdf",
    )
    .expect("Failed to create test material")
}

/// A completed-payment input for upsert tests
pub fn completed_payment(session_id: &str, user_id: &str, course_id: &str) -> UpsertPayment {
    UpsertPayment {
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        course_id: Some(course_id.to_string()),
        bundle_id: None,
        amount_cents: 4999,
        currency: "usd".to_string(),
        status: PaymentStatus::Completed,
        payment_method: "stripe".to_string(),
        item_title: "Test Course".to_string(),
        user_email: Some("buyer@example.com".to_string()),
    }
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
