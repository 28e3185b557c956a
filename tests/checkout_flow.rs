//! Entitlement and payment-ledger tests: idempotent grants, double-purchase
//! collapse, bundle cascade enrollment, upsert-by-session-id replay safety.

mod common;

use common::*;
use coursedesk::error::AppError;

// ============ Enrollment uniqueness ============

#[test]
fn test_grant_is_idempotent_and_counts_once() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 4999);
    let user = create_test_user(&conn, "buyer@example.com");

    let first = queries::grant_course_access(&conn, &user.id, &course, GrantedBy::Payment).unwrap();
    assert_eq!(first, GrantOutcome::Enrolled);

    // Second grant: the loser of a double-purchase race, or a replayed
    // webhook. Must no-op without touching the counter.
    let second = queries::grant_course_access(&conn, &user.id, &course, GrantedBy::Payment).unwrap();
    assert_eq!(second, GrantOutcome::AlreadyEnrolled);

    let course = queries::get_course_by_id(&conn, &course.id).unwrap().unwrap();
    assert_eq!(course.total_enrollments, 1);

    let purchases = queries::get_user_purchases(&conn, &user.id).unwrap();
    assert_eq!(purchases.purchased_courses, vec![course.id.clone()]);
}

#[test]
fn test_enrollment_records_provenance_and_version() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 4999);
    queries::create_new_version(&mut conn, &course, None).unwrap();
    let course = queries::get_course_by_id(&conn, &course.id).unwrap().unwrap();
    let user = create_test_user(&conn, "buyer@example.com");

    queries::grant_course_access(&conn, &user.id, &course, GrantedBy::Admin).unwrap();

    let enrollment = queries::get_enrollment(&conn, ItemType::Course, &course.id, &user.id)
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.granted_by, GrantedBy::Admin);
    assert_eq!(enrollment.version_enrolled, Some(2));
    assert_eq!(enrollment.status, EnrollmentStatus::Active);
}

#[test]
fn test_check_purchase_scenario() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course X", 4999);
    let user = create_test_user(&conn, "buyer@example.com");

    // Empty purchase list: not purchased
    assert!(!queries::has_purchased(&conn, &user.id, ItemType::Course, &course.id).unwrap());

    // Simulated completed webhook grant
    queries::grant_course_access(&conn, &user.id, &course, GrantedBy::Payment).unwrap();

    assert!(queries::has_purchased(&conn, &user.id, ItemType::Course, &course.id).unwrap());
}

// ============ Bundle grants ============

#[test]
fn test_bundle_grant_cascade_enrolls_members() {
    let mut conn = setup_test_db();
    let a = create_test_course(&mut conn, "Course A", 100);
    let b = create_test_course(&mut conn, "Course B", 200);
    let bundle = create_test_bundle(&mut conn, "Pack", vec![a.id.clone(), b.id.clone()]);
    let user = create_test_user(&conn, "buyer@example.com");

    let loaded = queries::get_bundle_by_id(&conn, &bundle.bundle.id).unwrap().unwrap();
    queries::grant_bundle_access(&conn, &user.id, &loaded, GrantedBy::Payment).unwrap();

    // Bundle entitlement plus one per member course
    assert!(queries::get_enrollment(&conn, ItemType::Bundle, &loaded.id, &user.id)
        .unwrap()
        .is_some());
    for course_id in [&a.id, &b.id] {
        assert!(queries::get_enrollment(&conn, ItemType::Course, course_id, &user.id)
            .unwrap()
            .is_some());
    }

    // Mirror has all three ids
    let purchases = queries::get_user_purchases(&conn, &user.id).unwrap();
    assert_eq!(purchases.purchased_bundles, vec![loaded.id.clone()]);
    assert_eq!(purchases.purchased_courses.len(), 2);
}

#[test]
fn test_bundle_grant_tolerates_prior_member_enrollment() {
    let mut conn = setup_test_db();
    let a = create_test_course(&mut conn, "Course A", 100);
    let b = create_test_course(&mut conn, "Course B", 200);
    let bundle = create_test_bundle(&mut conn, "Pack", vec![a.id.clone(), b.id.clone()]);
    let user = create_test_user(&conn, "buyer@example.com");

    // User already bought course A directly
    queries::grant_course_access(&conn, &user.id, &a, GrantedBy::Payment).unwrap();

    let loaded = queries::get_bundle_by_id(&conn, &bundle.bundle.id).unwrap().unwrap();
    queries::grant_bundle_access(&conn, &user.id, &loaded, GrantedBy::Payment)
        .expect("pre-existing member enrollment is a no-op, not an error");

    let a_row = queries::get_course_by_id(&conn, &a.id).unwrap().unwrap();
    assert_eq!(a_row.total_enrollments, 1, "no double-count for course A");
    let b_row = queries::get_course_by_id(&conn, &b.id).unwrap().unwrap();
    assert_eq!(b_row.total_enrollments, 1);

    // Mirror stays a set
    let purchases = queries::get_user_purchases(&conn, &user.id).unwrap();
    assert_eq!(
        purchases
            .purchased_courses
            .iter()
            .filter(|id| **id == a.id)
            .count(),
        1
    );
}

// ============ Revocation ============

#[test]
fn test_revoke_course_access() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 100);
    let user = create_test_user(&conn, "buyer@example.com");
    queries::grant_course_access(&conn, &user.id, &course, GrantedBy::Admin).unwrap();

    queries::revoke_course_access(&conn, &user.id, &course.id).unwrap();

    let enrollment = queries::get_enrollment(&conn, ItemType::Course, &course.id, &user.id)
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.status, EnrollmentStatus::Revoked);

    let course = queries::get_course_by_id(&conn, &course.id).unwrap().unwrap();
    assert_eq!(course.total_enrollments, 0);

    assert!(!queries::has_purchased(&conn, &user.id, ItemType::Course, &course.id).unwrap());
}

#[test]
fn test_regrant_after_revoke_reinstates() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 100);
    let user = create_test_user(&conn, "buyer@example.com");

    queries::grant_course_access(&conn, &user.id, &course, GrantedBy::Admin).unwrap();
    queries::revoke_course_access(&conn, &user.id, &course.id).unwrap();

    let outcome =
        queries::grant_course_access(&conn, &user.id, &course, GrantedBy::Payment).unwrap();
    assert_eq!(outcome, GrantOutcome::Enrolled);

    let enrollment = queries::get_enrollment(&conn, ItemType::Course, &course.id, &user.id)
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.status, EnrollmentStatus::Active);
    assert_eq!(enrollment.granted_by, GrantedBy::Payment);

    let course = queries::get_course_by_id(&conn, &course.id).unwrap().unwrap();
    assert_eq!(course.total_enrollments, 1);
}

#[test]
fn test_revoke_without_enrollment_is_not_found() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 100);
    let user = create_test_user(&conn, "buyer@example.com");
    assert!(matches!(
        queries::revoke_course_access(&conn, &user.id, &course.id),
        Err(AppError::NotFound(_))
    ));
}

// ============ Payment ledger ============

#[test]
fn test_payment_upsert_by_session_id_is_replay_safe() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 4999);
    let user = create_test_user(&conn, "buyer@example.com");

    let input = completed_payment("cs_test_replay", &user.id, &course.id);
    let first = queries::upsert_payment(&conn, &input).unwrap();
    let second = queries::upsert_payment(&conn, &input).unwrap();

    // Same row, not a duplicate
    assert_eq!(first.id, second.id);
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM payments WHERE session_id = 'cs_test_replay'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_webhook_replay_end_state_is_single_grant_and_single_payment() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 4999);
    let user = create_test_user(&conn, "buyer@example.com");

    // The webhook handler's effect, applied twice with the same session id
    // (at-least-once delivery), interleaved with a dev-mode direct grant.
    for _ in 0..2 {
        queries::grant_course_access(&conn, &user.id, &course, GrantedBy::Payment).unwrap();
        queries::upsert_payment(&conn, &completed_payment("cs_same", &user.id, &course.id))
            .unwrap();
    }

    let payments = queries::list_payments_for_user(&conn, &user.id).unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Completed);

    let purchases = queries::get_user_purchases(&conn, &user.id).unwrap();
    assert_eq!(purchases.purchased_courses.len(), 1);

    let course = queries::get_course_by_id(&conn, &course.id).unwrap().unwrap();
    assert_eq!(course.total_enrollments, 1);
}

#[test]
fn test_find_completed_payment_filters_status_and_item() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 4999);
    let user = create_test_user(&conn, "buyer@example.com");

    let mut pending = completed_payment("cs_pending", &user.id, &course.id);
    pending.status = PaymentStatus::Pending;
    queries::upsert_payment(&conn, &pending).unwrap();

    assert!(queries::find_completed_payment(&conn, &user.id, ItemType::Course, &course.id)
        .unwrap()
        .is_none());

    queries::upsert_payment(&conn, &completed_payment("cs_done", &user.id, &course.id)).unwrap();

    let found = queries::find_completed_payment(&conn, &user.id, ItemType::Course, &course.id)
        .unwrap()
        .unwrap();
    assert_eq!(found.session_id, "cs_done");
}

#[test]
fn test_payment_rejects_both_course_and_bundle() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 4999);
    let user = create_test_user(&conn, "buyer@example.com");

    let mut input = completed_payment("cs_bad", &user.id, &course.id);
    input.bundle_id = Some("cd_bnd_whatever".to_string());

    // The CHECK constraint enforces exactly-one-of at the schema level
    assert!(queries::upsert_payment(&conn, &input).is_err());
}
