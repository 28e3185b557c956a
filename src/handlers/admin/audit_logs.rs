//! Read access to the append-only audit trail.

use axum::extract::State;

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::{AuditLog, AuditLogQuery};
use crate::pagination::Paginated;

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Paginated<AuditLog>>> {
    let conn = state.audit.get()?;
    let (items, total) = queries::list_audit_logs(&conn, &query)?;
    Ok(Json(Paginated::new(items, total, query.limit(), query.offset())))
}
