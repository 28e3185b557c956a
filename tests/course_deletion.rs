//! Permanent-deletion tests: full cascade, bundle invariants, certificate
//! preservation, rollback atomicity.

mod common;

use common::*;

/// Build a course with two versions, media, progress, certificates, a
/// buyer, and bundle membership. Returns (course, buyer, sole_bundle_id,
/// shared_bundle_id, other_course_id).
fn populated_course(
    conn: &mut rusqlite::Connection,
) -> (Course, User, String, String, String) {
    let course = create_test_course(conn, "Doomed Course", 4999);
    let other = create_test_course(conn, "Survivor Course", 1999);

    queries::create_new_version(conn, &course, Some("v2")).unwrap();
    attach_test_video(conn, &course.id, 1, "a");
    attach_test_video(conn, &course.id, 2, "b");
    attach_test_material(conn, &course.id, 1, "slides");

    let buyer = create_test_user(conn, "buyer@example.com");
    let course = queries::get_course_by_id(conn, &course.id).unwrap().unwrap();
    queries::grant_course_access(conn, &buyer.id, &course, GrantedBy::Payment).unwrap();
    queries::upsert_progress(conn, &buyer.id, &course.id, 1, &["a".to_string()], 50).unwrap();
    queries::create_certificate(conn, &buyer.id, &course.id, "Doomed Course", None).unwrap();

    // One bundle where this is the sole course, one where it shares.
    let sole = create_test_bundle(conn, "Sole Bundle", vec![course.id.clone()]);
    let shared = create_test_bundle(
        conn,
        "Shared Bundle",
        vec![course.id.clone(), other.id.clone()],
    );

    let course = queries::get_course_by_id(conn, &course.id).unwrap().unwrap();
    (course, buyer, sole.bundle.id, shared.bundle.id, other.id)
}

#[test]
fn test_deletion_summary_counts_without_mutating() {
    let mut conn = setup_test_db();
    let (course, _, _, _, _) = populated_course(&mut conn);

    let summary = queries::get_deletion_summary(&conn, &course).unwrap();
    assert_eq!(summary.versions, 2);
    assert_eq!(summary.videos, 2);
    assert_eq!(summary.materials, 1);
    assert_eq!(summary.certificates_preserved, 1);
    assert_eq!(summary.progress_records, 1);
    assert_eq!(summary.affected_users, 1);
    assert_eq!(summary.affected_bundles.len(), 2);
    // 2 videos + 1 material, no thumbnails uploaded
    assert_eq!(summary.blob_objects, 3);

    let sole = summary
        .affected_bundles
        .iter()
        .find(|b| b.title == "Sole Bundle")
        .unwrap();
    assert!(sole.will_become_inactive);
    let shared = summary
        .affected_bundles
        .iter()
        .find(|b| b.title == "Shared Bundle")
        .unwrap();
    assert!(!shared.will_become_inactive);

    // Read-only: the course and all dependents still exist
    assert!(queries::get_course_by_id(&conn, &course.id).unwrap().is_some());
    assert_eq!(queries::list_versions(&conn, &course.id).unwrap().len(), 2);
}

#[test]
fn test_delete_course_cascades_and_returns_counts() {
    let mut conn = setup_test_db();
    let (course, buyer, sole_id, shared_id, other_id) = populated_course(&mut conn);

    let summary = queries::delete_course_cascade(&mut conn, &course).unwrap();
    assert_eq!(summary.versions, 2);
    assert_eq!(summary.videos, 2);
    assert_eq!(summary.materials, 1);
    assert_eq!(summary.progress_records, 1);
    assert_eq!(summary.affected_users, 1);
    assert_eq!(summary.certificates_preserved, 1);

    // Course and dependents gone
    assert!(queries::get_course_by_id(&conn, &course.id).unwrap().is_none());
    assert!(queries::list_versions(&conn, &course.id).unwrap().is_empty());
    assert!(queries::list_videos(&conn, &course.id, 1).unwrap().is_empty());
    assert!(queries::get_progress(&conn, &buyer.id, &course.id).unwrap().is_none());
    assert!(queries::get_enrollment(&conn, ItemType::Course, &course.id, &buyer.id)
        .unwrap()
        .is_none());

    // Purchase mirror scrubbed
    let purchases = queries::get_user_purchases(&conn, &buyer.id).unwrap();
    assert!(!purchases.purchased_courses.contains(&course.id));

    // The sole-member bundle is forced inactive and private
    let sole = queries::get_bundle_by_id(&conn, &sole_id).unwrap().unwrap();
    assert_eq!(sole.status, CourseStatus::Inactive);
    assert!(!sole.is_public);
    assert!(queries::bundle_course_ids(&conn, &sole_id).unwrap().is_empty());

    // The shared bundle stays active, minus the deleted course
    let shared = queries::get_bundle_by_id(&conn, &shared_id).unwrap().unwrap();
    assert_eq!(shared.status, CourseStatus::Active);
    assert_eq!(
        queries::bundle_course_ids(&conn, &shared_id).unwrap(),
        vec![other_id]
    );
}

#[test]
fn test_certificates_survive_deletion() {
    let mut conn = setup_test_db();
    let (course, buyer, _, _, _) = populated_course(&mut conn);

    queries::delete_course_cascade(&mut conn, &course).unwrap();

    let certs = queries::list_certificates_for_user(&conn, &buyer.id).unwrap();
    assert_eq!(certs.len(), 1);
    assert_eq!(certs[0].course_id, course.id);
    // The snapshot keeps the certificate meaningful after the course is gone
    assert_eq!(certs[0].course_title, "Doomed Course");
}

#[test]
fn test_certificate_blobs_are_not_in_deletion_key_set() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Course", 100);
    let user = create_test_user(&conn, "u@example.com");
    attach_test_video(&conn, &course.id, 1, "v");
    queries::create_certificate(
        &conn,
        &user.id,
        &course.id,
        "Course",
        Some("certificates/u/course.pdf"),
    )
    .unwrap();

    let keys = queries::collect_course_blob_keys(&conn, &course).unwrap();
    assert_eq!(keys.len(), 1);
    assert!(!keys.iter().any(|k| k.contains("certificates")));
}

#[test]
fn test_delete_rolls_back_fully_on_midway_failure() {
    let mut conn = setup_test_db();
    let (course, buyer, _, _, _) = populated_course(&mut conn);

    // Force a failure midway through the transaction: the purchase-mirror
    // scrub runs after progress/videos/materials/versions/enrollments are
    // deleted, so breaking it exercises rollback of the earlier deletes.
    conn.execute("ALTER TABLE user_purchases RENAME TO user_purchases_hidden", [])
        .unwrap();

    let result = queries::delete_course_cascade(&mut conn, &course);
    assert!(result.is_err(), "cascade must fail with the table missing");

    conn.execute("ALTER TABLE user_purchases_hidden RENAME TO user_purchases", [])
        .unwrap();

    // Database must be in its pre-call state: nothing partially deleted.
    assert!(queries::get_course_by_id(&conn, &course.id).unwrap().is_some());
    assert_eq!(queries::list_versions(&conn, &course.id).unwrap().len(), 2);
    assert_eq!(queries::list_videos(&conn, &course.id, 1).unwrap().len(), 1);
    assert_eq!(queries::list_videos(&conn, &course.id, 2).unwrap().len(), 1);
    assert!(queries::get_progress(&conn, &buyer.id, &course.id).unwrap().is_some());
    assert!(queries::get_enrollment(&conn, ItemType::Course, &course.id, &buyer.id)
        .unwrap()
        .is_some());
    let certs = queries::list_certificates_for_user(&conn, &buyer.id).unwrap();
    assert_eq!(certs.len(), 1, "certificates untouched on failure too");
}

#[test]
fn test_delete_bundle_keeps_course_access() {
    let mut conn = setup_test_db();
    let course = create_test_course(&mut conn, "Member Course", 100);
    let bundle = create_test_bundle(&mut conn, "Pack", vec![course.id.clone()]);
    let buyer = create_test_user(&conn, "buyer@example.com");

    // Buying the bundle enrolls into the member course as well
    let loaded = queries::get_bundle_by_id(&conn, &bundle.bundle.id).unwrap().unwrap();
    queries::grant_bundle_access(&conn, &buyer.id, &loaded, GrantedBy::Payment).unwrap();

    let deletion = {
        let bundle = queries::get_bundle_by_id(&conn, &bundle.bundle.id).unwrap().unwrap();
        queries::delete_bundle_cascade(&mut conn, &bundle).unwrap()
    };
    assert_eq!(deletion.enrollments_removed, 1);
    assert_eq!(deletion.purchases_scrubbed, 1);

    // Bundle gone, bundle purchase scrubbed
    assert!(queries::get_bundle_by_id(&conn, &deletion.bundle_id).unwrap().is_none());
    let purchases = queries::get_user_purchases(&conn, &buyer.id).unwrap();
    assert!(purchases.purchased_bundles.is_empty());

    // The per-course enrollment and purchase survive: access was granted
    // per-course at purchase time, not via a live bundle reference.
    assert!(queries::get_enrollment(&conn, ItemType::Course, &course.id, &buyer.id)
        .unwrap()
        .is_some());
    assert!(purchases.purchased_courses.contains(&course.id));
    assert!(queries::get_course_by_id(&conn, &course.id).unwrap().is_some());
}
