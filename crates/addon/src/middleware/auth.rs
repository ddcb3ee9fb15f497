//! Shared-secret authentication for webhooks and shop admin routes.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "x-shop-signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Largest webhook body read for signature verification.
const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

/// Authentication failures, all answered with 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid admin token")]
    InvalidToken,

    #[error("missing {SIGNATURE_HEADER} header")]
    MissingSignature,

    #[error("invalid webhook signature")]
    InvalidSignature,
}

/// Require `Authorization: Bearer <admin token>`.
///
/// # Errors
///
/// Returns [`AuthError`] when the token is absent or wrong.
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::MissingToken)?;

    if !constant_time_compare(token, state.auth().admin_token.expose_secret()) {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request with invalid token");
        return Err(AuthError::InvalidToken.into());
    }

    Ok(next.run(request).await)
}

/// Require a valid body signature in [`SIGNATURE_HEADER`].
///
/// The body is buffered to verify it and handed on unchanged.
///
/// # Errors
///
/// Returns [`AuthError`] when the signature is absent or does not match,
/// and a bad request when the body cannot be read.
pub async fn require_webhook_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();

    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingSignature)?;

    let bytes = to_bytes(body, MAX_WEBHOOK_BODY_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(format!("unreadable request body: {e}")))?;

    if let Err(e) = verify_signature(&state.auth().webhook_secret, &bytes, signature) {
        tracing::warn!(path = %parts.uri.path(), "Rejected webhook with invalid signature");
        return Err(e.into());
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Signature of `body` under `secret`, as sent in [`SIGNATURE_HEADER`].
///
/// # Errors
///
/// Returns [`AuthError::InvalidSignature`] if the key is rejected.
pub fn sign(secret: &SecretString, body: &[u8]) -> Result<String, AuthError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| AuthError::InvalidSignature)?;
    mac.update(body);

    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check a `sha256=<hex>` signature of `body`.
///
/// # Errors
///
/// Returns [`AuthError::InvalidSignature`] on any mismatch.
pub fn verify_signature(
    secret: &SecretString,
    body: &[u8],
    signature: &str,
) -> Result<(), AuthError> {
    let expected = sign(secret, body)?;

    if !constant_time_compare(&expected, signature.trim()) {
        return Err(AuthError::InvalidSignature);
    }

    tracing::debug!("Webhook signature verified");
    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
