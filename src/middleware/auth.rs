//! Bearer-token authentication.
//!
//! Token issuance lives in an external identity service; this middleware
//! only verifies signatures and mirrors the verified identity into the
//! users table on first sight. No cryptography beyond HS256 verification.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::db::{queries, AppState};
use crate::models::UserRole;

#[derive(Debug, Deserialize)]
struct Claims {
    /// User id.
    sub: String,
    email: String,
    #[allow(dead_code)]
    exp: i64,
}

/// Verifies bearer tokens against the shared secret.
pub struct AuthVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn verify(&self, token: &str) -> Option<(String, String)> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation).ok()?;
        Some((data.claims.sub, data.claims.email))
    }
}

/// The verified identity attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Require a valid token; mirror the identity into the users table.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&request).ok_or(StatusCode::UNAUTHORIZED)?;
    let (user_id, email) = state
        .auth
        .verify(token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    queries::ensure_user(&conn, &user_id, &email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    request.extensions_mut().insert(AuthUser { user_id, email });
    Ok(next.run(request).await)
}

/// Require a valid token belonging to an admin user.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&request).ok_or(StatusCode::UNAUTHORIZED)?;
    let (user_id, email) = state
        .auth
        .verify(token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    queries::ensure_user(&conn, &user_id, &email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user = queries::get_user_by_id(&conn, &user_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if user.role != UserRole::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    request.extensions_mut().insert(AuthUser { user_id, email });
    Ok(next.run(request).await)
}
