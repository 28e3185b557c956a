//! Checkout session creation and the purchase fast-path check.
//!
//! Entitlement is granted either directly (dev mode, no Stripe configured)
//! or later by the webhook handler once Stripe confirms payment. The
//! already-owned pre-check reads the denormalized purchase mirror: fast,
//! not authoritative; the data layer's unique constraints are what make
//! the race harmless.

use axum::extract::{Extension, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::{
    AuditAction, GrantedBy, ItemType, PaymentStatus, UpsertPayment,
};
use crate::payments::CheckoutItem;
use crate::util::AuditLogBuilder;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub bundle_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Where to send the buyer: Stripe's hosted page, or the success page
    /// directly when the dev-mode path already granted access.
    pub checkout_url: String,
    pub session_id: String,
    pub dev_completed: bool,
}

/// The item being bought, loaded and checked for purchasability.
struct TargetItem {
    item_type: ItemType,
    id: String,
    title: String,
    price_cents: i64,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: axum::http::HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let item = {
        let conn = state.db.get()?;

        let target = match (&request.course_id, &request.bundle_id) {
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "Provide either course_id or bundle_id, not both".into(),
                ))
            }
            (None, None) => {
                return Err(AppError::BadRequest(
                    "Provide course_id or bundle_id".into(),
                ))
            }
            (Some(course_id), None) => {
                let course = queries::get_course_by_id(&conn, course_id)?
                    .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
                if !course.is_purchasable() {
                    return Err(AppError::BadRequest("Course is not for sale".into()));
                }
                TargetItem {
                    item_type: ItemType::Course,
                    id: course.id.clone(),
                    title: course.title.display().to_string(),
                    price_cents: course.price_cents,
                }
            }
            (None, Some(bundle_id)) => {
                let bundle = queries::get_bundle_by_id(&conn, bundle_id)?
                    .ok_or_else(|| AppError::NotFound("Bundle not found".into()))?;
                if !bundle.is_purchasable() {
                    return Err(AppError::BadRequest("Bundle is not for sale".into()));
                }
                TargetItem {
                    item_type: ItemType::Bundle,
                    id: bundle.id.clone(),
                    title: bundle.title.display().to_string(),
                    price_cents: bundle.price_cents,
                }
            }
        };

        // Fast-path ownership check against the purchase mirror. Two racing
        // requests can both pass; the grant itself is idempotent.
        if queries::has_purchased(&conn, &user.user_id, target.item_type, &target.id)? {
            return Err(AppError::BadRequest("Item already purchased".into()));
        }

        target
    };

    match &state.stripe {
        None => dev_complete_purchase(&state, &user, &item, &headers).await,
        Some(stripe) => {
            let success_url = format!(
                "{}?item={}&type={}",
                state.success_page_url,
                item.id,
                item.item_type.as_ref()
            );
            let cancel_url = format!("{}?item={}", state.cancel_page_url, item.id);

            let (session_id, checkout_url) = stripe
                .create_checkout_session(
                    &CheckoutItem {
                        user_id: &user.user_id,
                        user_email: Some(&user.email),
                        item_id: &item.id,
                        item_type: item.item_type,
                        title: &item.title,
                        amount_cents: item.price_cents,
                        currency: &state.currency,
                    },
                    &success_url,
                    &cancel_url,
                )
                .await?;

            // No entitlement change here: the webhook grants on completion.
            Ok(Json(CheckoutResponse {
                checkout_url,
                session_id,
                dev_completed: false,
            }))
        }
    }
}

/// Stripe unconfigured: grant directly and record a completed payment
/// under a synthetic session id.
async fn dev_complete_purchase(
    state: &AppState,
    user: &AuthUser,
    item: &TargetItem,
    headers: &axum::http::HeaderMap,
) -> Result<Json<CheckoutResponse>> {
    let session_id = format!("dev_{}", Uuid::new_v4().as_simple());

    {
        let mut conn = state.db.get()?;
        let tx = conn.transaction()?;

        match item.item_type {
            ItemType::Course => {
                let course = queries::get_course_by_id(&tx, &item.id)?
                    .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
                queries::grant_course_access(&tx, &user.user_id, &course, GrantedBy::Payment)?;
            }
            ItemType::Bundle => {
                let bundle = queries::get_bundle_by_id(&tx, &item.id)?
                    .ok_or_else(|| AppError::NotFound("Bundle not found".into()))?;
                queries::grant_bundle_access(&tx, &user.user_id, &bundle, GrantedBy::Payment)?;
            }
        }

        queries::upsert_payment(
            &tx,
            &UpsertPayment {
                session_id: session_id.clone(),
                user_id: user.user_id.clone(),
                course_id: (item.item_type == ItemType::Course).then(|| item.id.clone()),
                bundle_id: (item.item_type == ItemType::Bundle).then(|| item.id.clone()),
                amount_cents: item.price_cents,
                currency: state.currency.clone(),
                status: PaymentStatus::Completed,
                payment_method: "dev".into(),
                item_title: item.title.clone(),
                user_email: Some(user.email.clone()),
            },
        )?;

        tx.commit()?;
    }

    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, headers)
            .actor(&user.user_id)
            .action(AuditAction::DevPurchase)
            .resource(item.item_type.as_ref(), &item.id)
            .title(item.title.clone())
            .save();
    }

    tracing::info!(
        "Dev-mode purchase completed: user={}, {}={}",
        user.user_id,
        item.item_type.as_ref(),
        item.id
    );

    Ok(Json(CheckoutResponse {
        checkout_url: state.success_page_url.clone(),
        session_id,
        dev_completed: true,
    }))
}

#[derive(Debug, Serialize)]
pub struct PurchaseCheck {
    pub has_purchased: bool,
}

/// Pure read against the denormalized purchase mirror. Never consults the
/// authoritative enrollment list.
pub async fn check_purchase(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<Json<PurchaseCheck>> {
    let conn = state.db.get()?;
    let has_purchased =
        queries::has_purchased(&conn, &user.user_id, ItemType::Course, &course_id)?;
    Ok(Json(PurchaseCheck { has_purchased }))
}
