// src/utils/admin.rs

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::{config::Config, error::AppError};

/// Header carrying the shared admin secret.
pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Compares two byte slices without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Checks the request's admin secret against the configured one.
pub fn is_admin(headers: &HeaderMap, secret: &str) -> bool {
    headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|provided| constant_time_eq(provided.as_bytes(), secret.as_bytes()))
}

/// Axum Middleware: Admin Authorization.
///
/// Rejects the request with 401 unless `x-admin-secret` matches `ADMIN_SECRET`.
pub async fn admin_middleware(
    State(config): State<Config>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !is_admin(req.headers(), &config.admin_secret) {
        tracing::warn!(path = %req.uri().path(), "Rejected admin request");
        return Err(AppError::AuthError("unauthorized".to_string()));
    }

    Ok(next.run(req).await)
}
