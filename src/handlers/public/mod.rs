mod catalog;
mod checkout;
mod me;
mod receipts;

pub use catalog::*;
pub use checkout::*;
pub use me::*;
pub use receipts::*;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::db::AppState;

/// Public catalog routes plus authenticated buyer routes.
pub fn router(state: AppState) -> Router<AppState> {
    let authed = Router::new()
        .route("/checkout", post(create_checkout_session))
        .route("/me/purchases/courses/{course_id}", get(check_purchase))
        .route("/me/certificates", get(list_my_certificates))
        .route("/me/progress", put(upsert_my_progress))
        .route("/me/courses/{course_id}/content", get(course_content))
        .route("/me/receipts", get(list_my_receipts))
        .route("/me/receipts/courses/{course_id}", get(get_receipt))
        .route("/me/receipts/bundles/{bundle_id}", get(get_bundle_receipt))
        .route(
            "/me/receipts/courses/{course_id}/download",
            get(download_receipt),
        )
        .layer(middleware::from_fn_with_state(
            state,
            crate::middleware::require_user,
        ));

    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/{id}", get(get_course))
        .route("/bundles", get(list_bundles))
        .route("/bundles/{id}", get(get_bundle))
        .merge(authed)
}
