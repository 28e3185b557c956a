//! User mirror, progress, and audit-trail tests.

mod common;

use common::*;

// ============ Users ============

#[test]
fn test_ensure_user_is_idempotent() {
    let conn = setup_test_db();

    queries::ensure_user(&conn, "ext_user_1", "Buyer@Example.com").unwrap();
    queries::ensure_user(&conn, "ext_user_1", "buyer@example.com").unwrap();

    assert_eq!(queries::count_users(&conn).unwrap(), 1);
    let user = queries::get_user_by_id(&conn, "ext_user_1").unwrap().unwrap();
    assert_eq!(user.email, "buyer@example.com");
    assert_eq!(user.role, UserRole::Student);
}

#[test]
fn test_promote_admin_by_email() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "ops@example.com");
    assert_eq!(user.role, UserRole::Student);

    assert!(queries::promote_admin_by_email(&conn, "OPS@example.com ").unwrap());
    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert_eq!(user.role, UserRole::Admin);

    assert!(!queries::promote_admin_by_email(&conn, "nobody@example.com").unwrap());
}

// ============ Progress ============

#[test]
fn test_progress_upserts_per_user_course() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 100);
    let user = create_test_user(&conn, "student@example.com");

    let p1 = queries::upsert_progress(&conn, &user.id, &course.id, 1, &["v1".to_string()], 25)
        .unwrap();
    assert_eq!(p1.percent, 25);
    assert_eq!(p1.completed_videos, vec!["v1"]);

    let p2 = queries::upsert_progress(
        &conn,
        &user.id,
        &course.id,
        1,
        &["v1".to_string(), "v2".to_string()],
        50,
    )
    .unwrap();
    assert_eq!(p2.id, p1.id, "one progress row per (user, course)");
    assert_eq!(p2.percent, 50);
    assert_eq!(p2.completed_videos.len(), 2);
}

#[test]
fn test_progress_percent_is_clamped() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 100);
    let user = create_test_user(&conn, "student@example.com");

    let p = queries::upsert_progress(&conn, &user.id, &course.id, 1, &[], 150).unwrap();
    assert_eq!(p.percent, 100);
}

// ============ Audit trail ============

#[test]
fn test_audit_log_append_and_filter() {
    let audit_conn = setup_test_audit_db();

    queries::create_audit_log(
        &audit_conn,
        true,
        AuditAction::CreateCourse,
        "course",
        "cd_crs_1",
        Some("Intro"),
        "cd_usr_admin",
        Some(&serde_json::json!({ "price_cents": 4999 })),
        None,
        Some("10.0.0.1"),
        Some("test-agent"),
    )
    .unwrap();
    queries::create_audit_log(
        &audit_conn,
        true,
        AuditAction::DeleteCourse,
        "course",
        "cd_crs_1",
        Some("Intro"),
        "cd_usr_admin",
        None,
        Some(&serde_json::json!({ "versions": 2, "videos": 3 })),
        None,
        None,
    )
    .unwrap();

    let (all, total) = queries::list_audit_logs(&audit_conn, &AuditLogQuery::default()).unwrap();
    assert_eq!(total, 2);
    assert_eq!(all.len(), 2);

    let (deletes, total) = queries::list_audit_logs(
        &audit_conn,
        &AuditLogQuery {
            action: Some("delete_course".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(total, 1);
    assert_eq!(deletes[0].action, "delete_course");
    let summary = deletes[0].deletion_summary.as_ref().unwrap();
    assert_eq!(summary["versions"], 2);
}

#[test]
fn test_audit_log_disabled_writes_nothing() {
    let audit_conn = setup_test_audit_db();

    queries::create_audit_log(
        &audit_conn,
        false,
        AuditAction::CreateCourse,
        "course",
        "cd_crs_1",
        None,
        "cd_usr_admin",
        None,
        None,
        None,
        None,
    )
    .unwrap();

    let (_, total) = queries::list_audit_logs(&audit_conn, &AuditLogQuery::default()).unwrap();
    assert_eq!(total, 0);
}

#[test]
fn test_certificate_unique_per_user_course() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 100);
    let user = create_test_user(&conn, "student@example.com");

    queries::create_certificate(&conn, &user.id, &course.id, "Course", None).unwrap();
    let err = queries::create_certificate(&conn, &user.id, &course.id, "Course", None);
    assert!(matches!(err, Err(coursedesk::error::AppError::Conflict(_))));
}
