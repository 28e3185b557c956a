//! Receipt rendering.
//!
//! A pure formatting function from a payment ledger row to an HTML
//! document. No I/O, no templating engine; the document is small enough
//! that a format string stays readable.

use chrono::{TimeZone, Utc};

use crate::models::Payment;

fn format_amount(amount_cents: i64, currency: &str) -> String {
    format!(
        "{}.{:02} {}",
        amount_cents / 100,
        amount_cents % 100,
        currency.to_uppercase()
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render a receipt for a completed payment.
pub fn render_receipt_html(payment: &Payment) -> String {
    let date = Utc
        .timestamp_opt(payment.created_at, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| payment.created_at.to_string());

    let item_kind = match payment.bundle_id {
        Some(_) => "Bundle",
        None => "Course",
    };

    let buyer = payment
        .user_email
        .as_deref()
        .unwrap_or(payment.user_id.as_str());

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Receipt {id}</title>
<style>
body {{ font-family: sans-serif; max-width: 40rem; margin: 2rem auto; color: #222; }}
table {{ border-collapse: collapse; width: 100%; }}
td {{ padding: 0.4rem 0.6rem; border-bottom: 1px solid #ddd; }}
td:first-child {{ color: #666; width: 30%; }}
</style>
</head>
<body>
<h1>Receipt</h1>
<table>
<tr><td>Receipt no.</td><td>{id}</td></tr>
<tr><td>Date</td><td>{date}</td></tr>
<tr><td>{item_kind}</td><td>{title}</td></tr>
<tr><td>Buyer</td><td>{buyer}</td></tr>
<tr><td>Amount</td><td>{amount}</td></tr>
<tr><td>Payment method</td><td>{method}</td></tr>
<tr><td>Reference</td><td>{session}</td></tr>
</table>
</body>
</html>
"#,
        id = escape(&payment.id),
        date = date,
        item_kind = item_kind,
        title = escape(&payment.item_title),
        buyer = escape(buyer),
        amount = format_amount(payment.amount_cents, &payment.currency),
        method = escape(&payment.payment_method),
        session = escape(&payment.session_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentStatus;

    fn payment() -> Payment {
        Payment {
            id: "cd_pay_0123".into(),
            session_id: "cs_test_123".into(),
            user_id: "cd_usr_1".into(),
            course_id: Some("cd_crs_1".into()),
            bundle_id: None,
            amount_cents: 4999,
            currency: "usd".into(),
            status: PaymentStatus::Completed,
            payment_method: "card".into(),
            item_title: "Intro to <Trading>".into(),
            user_email: Some("buyer@example.com".into()),
            created_at: 1704067200,
            updated_at: 1704067200,
        }
    }

    #[test]
    fn test_renders_amount_and_title() {
        let html = render_receipt_html(&payment());
        assert!(html.contains("49.99 USD"));
        assert!(html.contains("Intro to &lt;Trading&gt;"));
        assert!(html.contains("buyer@example.com"));
        assert!(html.contains("2024-01-01"));
        assert!(html.contains("cs_test_123"));
    }

    #[test]
    fn test_bundle_receipt_labels_bundle() {
        let mut p = payment();
        p.course_id = None;
        p.bundle_id = Some("cd_bnd_1".into());
        let html = render_receipt_html(&p);
        assert!(html.contains("<td>Bundle</td>"));
    }

    #[test]
    fn test_zero_padded_cents() {
        let mut p = payment();
        p.amount_cents = 500;
        assert!(render_receipt_html(&p).contains("5.00 USD"));
    }
}
