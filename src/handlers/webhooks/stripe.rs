//! Stripe webhook reconciliation.
//!
//! The handler must be safe under at-least-once, out-of-order delivery:
//! entitlement grants are idempotent (set-semantics mirror, unique-index
//! enrollments) and the payment ledger is upserted by session id, so a
//! replayed `checkout.session.completed` updates the same row it created.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::db::{queries, AppState};
use crate::models::{
    AuditAction, GrantedBy, ItemType, PaymentStatus, UpsertPayment,
};
use crate::payments::{StripeCheckoutSession, StripeWebhookEvent};
use crate::util::AuditLogBuilder;

/// Result type for webhook operations.
type WebhookResult = (StatusCode, &'static str);

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    match process(&state, &headers, &body) {
        Ok(result) => result,
        Err(result) => result,
    }
}

fn process(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Result<WebhookResult, WebhookResult> {
    // Return 200 when Stripe simply isn't configured: a 5xx would make
    // the provider retry forever against a server that can never verify.
    let Some(stripe) = &state.stripe else {
        return Ok((StatusCode::OK, "Stripe not configured"));
    };

    let signature = headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
        .to_str()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid signature header"))?;

    // Signature failure is terminal for this request: no state change.
    match stripe.verify_webhook_signature(body, signature) {
        Ok(true) => {}
        Ok(false) => return Err((StatusCode::BAD_REQUEST, "Invalid signature")),
        Err(e) => {
            tracing::warn!("Stripe signature verification error: {}", e);
            return Err((StatusCode::BAD_REQUEST, "Invalid signature"));
        }
    }

    let event: StripeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse Stripe webhook: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid JSON")
    })?;

    match event.event_type.as_str() {
        "checkout.session.completed" => process_checkout_completed(state, &event),
        other => {
            tracing::debug!("Ignoring Stripe event type: {}", other);
            Ok((StatusCode::OK, "Ignored"))
        }
    }
}

fn process_checkout_completed(
    state: &AppState,
    event: &StripeWebhookEvent,
) -> Result<WebhookResult, WebhookResult> {
    let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
        .map_err(|e| {
            tracing::error!("Failed to parse checkout session: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid checkout session")
        })?;

    if session.payment_status != "paid" {
        return Ok((StatusCode::OK, "Not paid, ignored"));
    }

    // The metadata identifiers are the whole reconciliation contract.
    // Missing ones are fatal for this event; Stripe's retry policy is
    // relied upon in case this was transient corruption on our side.
    let (user_id, item_id, item_type) = match (
        session.metadata.user_id.as_deref(),
        session.metadata.item_id.as_deref(),
        session.metadata.item_type.as_deref(),
    ) {
        (Some(u), Some(i), Some(t)) => {
            let item_type = t.parse::<ItemType>().map_err(|_| {
                tracing::error!("Unknown item_type in session {}: {}", session.id, t);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unknown item type")
            })?;
            (u.to_string(), i.to_string(), item_type)
        }
        _ => {
            tracing::error!(
                "Checkout session {} missing metadata identifiers",
                session.id
            );
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Missing metadata"));
        }
    };

    let mut conn = state.db.get().map_err(|e| {
        tracing::error!("Failed to get DB connection: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;
    let tx = conn.transaction().map_err(|e| {
        tracing::error!("Failed to start transaction: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;

    // The buyer may not have touched this service before (checkout started
    // from another client); mirror the identity so grants have a user row.
    let email = session
        .customer_email
        .clone()
        .unwrap_or_else(|| format!("{}@unknown.invalid", user_id));
    queries::ensure_user(&tx, &user_id, &email).map_err(|e| {
        tracing::error!("Failed to ensure user {}: {}", user_id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;

    // Load the item and grant. Both grant paths tolerate already-enrolled,
    // which is exactly what a replayed event produces.
    let (title, price_cents) = match item_type {
        ItemType::Course => {
            let course = match queries::get_course_by_id(&tx, &item_id) {
                Ok(Some(c)) => c,
                Ok(None) => {
                    tracing::error!("Webhook references missing course: {}", item_id);
                    return Ok((StatusCode::OK, "Course not found"));
                }
                Err(e) => {
                    tracing::error!("DB error: {}", e);
                    return Err((StatusCode::INTERNAL_SERVER_ERROR, "Database error"));
                }
            };
            queries::grant_course_access(&tx, &user_id, &course, GrantedBy::Payment).map_err(
                |e| {
                    tracing::error!("Failed to grant course access: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Grant failed")
                },
            )?;
            (course.title.display().to_string(), course.price_cents)
        }
        ItemType::Bundle => {
            let bundle = match queries::get_bundle_by_id(&tx, &item_id) {
                Ok(Some(b)) => b,
                Ok(None) => {
                    tracing::error!("Webhook references missing bundle: {}", item_id);
                    return Ok((StatusCode::OK, "Bundle not found"));
                }
                Err(e) => {
                    tracing::error!("DB error: {}", e);
                    return Err((StatusCode::INTERNAL_SERVER_ERROR, "Database error"));
                }
            };
            queries::grant_bundle_access(&tx, &user_id, &bundle, GrantedBy::Payment).map_err(
                |e| {
                    tracing::error!("Failed to grant bundle access: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Grant failed")
                },
            )?;
            (bundle.title.display().to_string(), bundle.price_cents)
        }
    };

    // Upsert by the provider's session id: the replay-safety anchor.
    queries::upsert_payment(
        &tx,
        &UpsertPayment {
            session_id: session.id.clone(),
            user_id: user_id.clone(),
            course_id: (item_type == ItemType::Course).then(|| item_id.clone()),
            bundle_id: (item_type == ItemType::Bundle).then(|| item_id.clone()),
            amount_cents: session.amount_total.unwrap_or(price_cents),
            currency: session
                .currency
                .clone()
                .unwrap_or_else(|| state.currency.clone()),
            status: PaymentStatus::Completed,
            payment_method: "stripe".into(),
            item_title: title.clone(),
            user_email: session.customer_email.clone(),
        },
    )
    .map_err(|e| {
        tracing::error!("Failed to upsert payment: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Payment upsert failed")
    })?;

    tx.commit().map_err(|e| {
        tracing::error!("Failed to commit webhook transaction: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;

    // Post-commit, best-effort.
    if let Ok(audit_conn) = state.audit.get() {
        AuditLogBuilder::without_request(&audit_conn, state.audit_log_enabled)
            .action(AuditAction::PurchaseCompleted)
            .resource(item_type.as_ref(), &item_id)
            .title(title)
            .save();
    }

    tracing::info!(
        "Stripe checkout completed: session={}, user={}, {}={}",
        session.id,
        user_id,
        item_type.as_ref(),
        item_id
    );

    Ok((StatusCode::OK, "OK"))
}
