//! Receipt lookup and download.
//!
//! A missing ledger row for an owned item (dev-mode grant that predates
//! the ledger, a webhook that never arrived) is self-healed: a fallback
//! completed Payment is synthesized under a `recovered_...` session id so
//! a receipt can still be produced. No money moves.

use axum::extract::{Extension, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::{ItemType, Payment, PaymentStatus, UpsertPayment};
use crate::receipt::render_receipt_html;

/// Find the completed payment for (user, item), synthesizing a recovered
/// row when the mirror says the user owns the item but no ledger row exists.
fn find_or_recover_payment(
    conn: &Connection,
    state: &AppState,
    user: &AuthUser,
    item_type: ItemType,
    item_id: &str,
) -> Result<Payment> {
    if let Some(payment) = queries::find_completed_payment(conn, &user.user_id, item_type, item_id)?
    {
        return Ok(payment);
    }

    if !queries::has_purchased(conn, &user.user_id, item_type, item_id)? {
        return Err(AppError::NotFound("No purchase found for this item".into()));
    }

    // Owned but no ledger row: synthesize one from the current item state.
    let (title, price_cents) = match item_type {
        ItemType::Course => {
            let course = queries::get_course_by_id(conn, item_id)?
                .ok_or_else(|| AppError::NotFound("Course no longer exists".into()))?;
            (course.title.display().to_string(), course.price_cents)
        }
        ItemType::Bundle => {
            let bundle = queries::get_bundle_by_id(conn, item_id)?
                .ok_or_else(|| AppError::NotFound("Bundle no longer exists".into()))?;
            (bundle.title.display().to_string(), bundle.price_cents)
        }
    };

    tracing::warn!(
        "Synthesizing missing payment row: user={}, {}={}",
        user.user_id,
        item_type.as_ref(),
        item_id
    );

    queries::upsert_payment(
        conn,
        &UpsertPayment {
            session_id: format!("recovered_{}", Uuid::new_v4().as_simple()),
            user_id: user.user_id.clone(),
            course_id: (item_type == ItemType::Course).then(|| item_id.to_string()),
            bundle_id: (item_type == ItemType::Bundle).then(|| item_id.to_string()),
            amount_cents: price_cents,
            currency: state.currency.clone(),
            status: PaymentStatus::Completed,
            payment_method: "recovered".into(),
            item_title: title,
            user_email: Some(user.email.clone()),
        },
    )
}

pub async fn get_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<Json<Payment>> {
    let conn = state.db.get()?;
    let payment = find_or_recover_payment(&conn, &state, &user, ItemType::Course, &course_id)?;
    Ok(Json(payment))
}

pub async fn get_bundle_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(bundle_id): Path<String>,
) -> Result<Json<Payment>> {
    let conn = state.db.get()?;
    let payment = find_or_recover_payment(&conn, &state, &user, ItemType::Bundle, &bundle_id)?;
    Ok(Json(payment))
}

/// Receipt as a downloadable HTML document.
pub async fn download_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<Response> {
    let conn = state.db.get()?;
    let payment = find_or_recover_payment(&conn, &state, &user, ItemType::Course, &course_id)?;
    let html = render_receipt_html(&payment);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"receipt-{}.html\"", payment.id),
            ),
        ],
        html,
    )
        .into_response())
}

pub async fn list_my_receipts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Payment>>> {
    let conn = state.db.get()?;
    let payments = queries::list_payments_for_user(&conn, &user.user_id)?;
    Ok(Json(payments))
}
