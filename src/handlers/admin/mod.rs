mod audit_logs;
mod bundles;
mod courses;
mod deletion;
mod media;
mod users;
mod versions;

pub use audit_logs::*;
pub use bundles::*;
pub use courses::*;
pub use deletion::*;
pub use media::*;
pub use users::*;
pub use versions::*;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::db::AppState;
use crate::models::MAX_VIDEO_BYTES;

/// Administrative routes, all behind admin auth.
pub fn router(state: AppState) -> Router<AppState> {
    // Multipart bodies need headroom over the largest allowed file.
    let upload_limit = (MAX_VIDEO_BYTES as usize) + 1024 * 1024;

    let uploads = Router::new()
        .route(
            "/admin/courses/{course_id}/versions/{version}/videos",
            post(upload_video),
        )
        .route(
            "/admin/courses/{course_id}/versions/{version}/materials",
            post(upload_material),
        )
        .route(
            "/admin/courses/{course_id}/versions/{version}/thumbnail",
            post(upload_thumbnail),
        )
        .layer(DefaultBodyLimit::max(upload_limit));

    Router::new()
        .route("/admin/courses", get(list_all_courses).post(create_course))
        .route(
            "/admin/courses/{id}",
            get(get_course_admin).put(update_course).delete(delete_course),
        )
        .route("/admin/courses/{id}/deactivate", post(deactivate_course))
        .route("/admin/courses/{id}/reactivate", post(reactivate_course))
        .route("/admin/courses/{id}/archive", post(archive_course))
        .route("/admin/courses/{id}/unarchive", post(unarchive_course))
        .route(
            "/admin/courses/{id}/deletion-summary",
            get(get_deletion_summary),
        )
        .route(
            "/admin/courses/{id}/versions",
            get(list_versions).post(create_new_version),
        )
        .route("/admin/bundles", get(list_all_bundles).post(create_bundle))
        .route(
            "/admin/bundles/{id}",
            get(get_bundle_admin).put(update_bundle).delete(delete_bundle),
        )
        .route("/admin/bundles/{id}/archive", post(archive_bundle))
        .route("/admin/bundles/{id}/unarchive", post(unarchive_bundle))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", get(get_user))
        .route(
            "/admin/users/{user_id}/courses/{course_id}",
            put(grant_course_access).delete(revoke_course_access),
        )
        .route("/admin/audit-logs", get(list_audit_logs))
        .merge(uploads)
        .layer(middleware::from_fn_with_state(
            state,
            crate::middleware::require_admin,
        ))
}
