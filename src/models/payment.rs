use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::enrollment::ItemType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Ledger row for one purchase, keyed by the external checkout session id.
///
/// `session_id` is unique: webhook replays upsert the same row instead of
/// creating duplicates. Synthetic ids are used where no provider session
/// exists (`dev_...` for dev-mode grants, `recovered_...` for self-healed
/// receipt rows).
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: String,
    /// Display title of the purchased item at purchase time.
    pub item_title: String,
    /// Buyer email at purchase time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Payment {
    pub fn item_type(&self) -> ItemType {
        if self.bundle_id.is_some() {
            ItemType::Bundle
        } else {
            ItemType::Course
        }
    }
}

/// Input for the upsert-by-session-id write.
#[derive(Debug, Clone)]
pub struct UpsertPayment {
    pub session_id: String,
    pub user_id: String,
    pub course_id: Option<String>,
    pub bundle_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub item_title: String,
    pub user_email: Option<String>,
}
