//! Stripe webhook signature verification and event parsing tests.

mod common;

use common::now;
use coursedesk::payments::{StripeCheckoutSession, StripeClient, StripeWebhookEvent};

fn client() -> StripeClient {
    StripeClient::new("sk_test_xxx".to_string(), "whsec_test_secret".to_string())
}

const PAYLOAD: &[u8] = br#"{"type":"checkout.session.completed","data":{"object":{}}}"#;

#[test]
fn test_valid_signature_verifies() {
    let client = client();
    let header = client.sign_payload_for_tests(PAYLOAD, now());
    assert!(client.verify_webhook_signature(PAYLOAD, &header).unwrap());
}

#[test]
fn test_tampered_payload_fails() {
    let client = client();
    let header = client.sign_payload_for_tests(PAYLOAD, now());
    let tampered = br#"{"type":"checkout.session.completed","data":{"object":{"evil":1}}}"#;
    assert!(!client.verify_webhook_signature(tampered, &header).unwrap());
}

#[test]
fn test_wrong_secret_fails() {
    let signer = StripeClient::new("sk_test_xxx".to_string(), "whsec_other".to_string());
    let header = signer.sign_payload_for_tests(PAYLOAD, now());
    assert!(!client().verify_webhook_signature(PAYLOAD, &header).unwrap());
}

#[test]
fn test_old_timestamp_rejected() {
    let client = client();
    // Beyond the 5 minute tolerance window
    let header = client.sign_payload_for_tests(PAYLOAD, now() - 600);
    assert!(!client.verify_webhook_signature(PAYLOAD, &header).unwrap());
}

#[test]
fn test_future_timestamp_rejected() {
    let client = client();
    let header = client.sign_payload_for_tests(PAYLOAD, now() + 600);
    assert!(!client.verify_webhook_signature(PAYLOAD, &header).unwrap());
}

#[test]
fn test_malformed_header_is_bad_request() {
    let client = client();
    assert!(client.verify_webhook_signature(PAYLOAD, "garbage").is_err());
    assert!(client
        .verify_webhook_signature(PAYLOAD, "t=notanumber,v1=abc")
        .is_err());
    // Missing v1 part
    let ts = now();
    assert!(client
        .verify_webhook_signature(PAYLOAD, &format!("t={}", ts))
        .is_err());
}

#[test]
fn test_checkout_completed_event_parses_metadata() {
    let body = serde_json::json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_123",
                "payment_status": "paid",
                "customer_email": "buyer@example.com",
                "amount_total": 4999,
                "currency": "usd",
                "metadata": {
                    "user_id": "cd_usr_abc",
                    "item_id": "cd_crs_def",
                    "item_type": "course"
                }
            }
        }
    });

    let event: StripeWebhookEvent = serde_json::from_value(body).unwrap();
    assert_eq!(event.event_type, "checkout.session.completed");

    let session: StripeCheckoutSession = serde_json::from_value(event.data.object).unwrap();
    assert_eq!(session.id, "cs_test_123");
    assert_eq!(session.payment_status, "paid");
    assert_eq!(session.metadata.user_id.as_deref(), Some("cd_usr_abc"));
    assert_eq!(session.metadata.item_id.as_deref(), Some("cd_crs_def"));
    assert_eq!(session.metadata.item_type.as_deref(), Some("course"));
    assert_eq!(session.amount_total, Some(4999));
}

#[test]
fn test_session_with_missing_metadata_still_parses() {
    // Missing identifiers are a handler-level 500, not a parse failure:
    // the event must deserialize so the handler can report precisely.
    let object = serde_json::json!({
        "id": "cs_test_456",
        "payment_status": "paid",
        "metadata": {}
    });
    let session: StripeCheckoutSession = serde_json::from_value(object).unwrap();
    assert!(session.metadata.user_id.is_none());
    assert!(session.metadata.item_id.is_none());
}
