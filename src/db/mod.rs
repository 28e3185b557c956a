mod from_row;
pub mod queries;
mod schema;

pub use schema::{init_audit_db, init_db};

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::middleware::AuthVerifier;
use crate::payments::StripeClient;
use crate::storage::BlobStorage;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding database pools, external clients and configuration
#[derive(Clone)]
pub struct AppState {
    /// Main database pool (courses, bundles, users, payments, ...)
    pub db: DbPool,
    /// Audit log database pool (separate file to isolate growth)
    pub audit: DbPool,
    /// Blob store client. None = unconfigured; upload paths fail with a
    /// dependency error, deletion proceeds database-only.
    pub storage: Option<Arc<BlobStorage>>,
    /// Stripe client. None = unconfigured; checkout takes the dev-mode
    /// direct-grant path.
    pub stripe: Option<Arc<StripeClient>>,
    /// Verifies bearer tokens minted by the external identity service.
    pub auth: Arc<AuthVerifier>,
    /// Base URL for webhook/redirect callbacks (e.g. https://api.example.com)
    pub base_url: String,
    /// Where the payment provider sends the buyer after success/cancel.
    pub success_page_url: String,
    pub cancel_page_url: String,
    /// Currency code for all payments (single-currency system).
    pub currency: String,
    pub audit_log_enabled: bool,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
