//! Bundle lifecycle tests: membership validation, the non-empty-while-active
//! invariant, archive transitions.

mod common;

use common::*;
use coursedesk::error::AppError;

#[test]
fn test_create_bundle_with_members() {
    let mut conn = setup_test_db();
    let a = create_test_course(&mut conn, "Course A", 100);
    let b = create_test_course(&mut conn, "Course B", 200);

    let bundle = create_test_bundle(&mut conn, "Starter Pack", vec![a.id.clone(), b.id.clone()]);
    assert_eq!(bundle.bundle.status, CourseStatus::Active);
    assert_eq!(bundle.course_ids, vec![a.id, b.id]);
    assert_eq!(bundle.bundle.slug, "starter-pack");
    assert!(bundle.bundle.id.starts_with("cd_bnd_"));
}

#[test]
fn test_create_bundle_requires_members() {
    let mut conn = setup_test_db();
    let input = CreateBundle {
        title: "Empty".into(),
        description: None,
        price_cents: 100,
        course_ids: vec![],
        is_public: true,
    };
    match queries::create_bundle(&mut conn, &input) {
        Err(AppError::Validation(fields)) => assert_eq!(fields, vec!["course_ids"]),
        other => panic!("expected validation error, got {:?}", other.err()),
    }
}

#[test]
fn test_create_bundle_rejects_unknown_course() {
    let mut conn = setup_test_db();
    let input = CreateBundle {
        title: "Ghost Pack".into(),
        description: None,
        price_cents: 100,
        course_ids: vec!["cd_crs_missing".to_string()],
        is_public: true,
    };
    assert!(matches!(
        queries::create_bundle(&mut conn, &input),
        Err(AppError::NotFound(_))
    ));

    // The failed create must not leave a bundle row behind
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM bundles", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_update_replaces_member_set() {
    let mut conn = setup_test_db();
    let a = create_test_course(&mut conn, "Course A", 100);
    let b = create_test_course(&mut conn, "Course B", 200);
    let bundle = create_test_bundle(&mut conn, "Pack", vec![a.id.clone()]);

    let loaded = queries::get_bundle_by_id(&conn, &bundle.bundle.id).unwrap().unwrap();
    let updated = queries::update_bundle(
        &mut conn,
        &loaded,
        &UpdateBundle {
            course_ids: Some(vec![b.id.clone()]),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.course_ids, vec![b.id]);
}

#[test]
fn test_emptying_members_forces_inactive() {
    let mut conn = setup_test_db();
    let a = create_test_course(&mut conn, "Course A", 100);
    let bundle = create_test_bundle(&mut conn, "Pack", vec![a.id.clone()]);

    let loaded = queries::get_bundle_by_id(&conn, &bundle.bundle.id).unwrap().unwrap();
    let updated = queries::update_bundle(
        &mut conn,
        &loaded,
        &UpdateBundle {
            course_ids: Some(vec![]),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(updated.bundle.status, CourseStatus::Inactive);
    assert!(!updated.bundle.is_public);
    assert!(updated.course_ids.is_empty());
}

#[test]
fn test_bundle_archive_round_trip() {
    let mut conn = setup_test_db();
    let a = create_test_course(&mut conn, "Course A", 100);
    let bundle = create_test_bundle(&mut conn, "Pack", vec![a.id]);

    let archived = queries::archive_bundle(&conn, &bundle.bundle.id, "retired", 6).unwrap();
    assert_eq!(archived.status, CourseStatus::Archived);
    assert!(archived.archived_at.is_some());

    let restored = queries::unarchive_bundle(&conn, &bundle.bundle.id).unwrap();
    assert_eq!(restored.status, CourseStatus::Active);
    assert!(restored.archived_at.is_none());
    assert!(restored.archive_reason.is_none());
}

#[test]
fn test_public_listing_excludes_inactive_bundles() {
    let mut conn = setup_test_db();
    let a = create_test_course(&mut conn, "Course A", 100);
    let visible = create_test_bundle(&mut conn, "Visible", vec![a.id.clone()]);
    let hidden = create_test_bundle(&mut conn, "Hidden", vec![a.id.clone()]);

    let loaded = queries::get_bundle_by_id(&conn, &hidden.bundle.id).unwrap().unwrap();
    queries::update_bundle(
        &mut conn,
        &loaded,
        &UpdateBundle {
            course_ids: Some(vec![]),
            ..Default::default()
        },
    )
    .unwrap();

    let (public, total) = queries::list_bundles_paginated(&conn, 50, 0, true).unwrap();
    assert_eq!(total, 1);
    assert_eq!(public[0].id, visible.bundle.id);

    let (all, all_total) = queries::list_bundles_paginated(&conn, 50, 0, false).unwrap();
    assert_eq!(all_total, 2);
    assert_eq!(all.len(), 2);
}
