//! # Authentication Module
//!
//! Two independent checks guard the Agora HTTP API.
//!
//! ## API Key
//!
//! If an API key is configured (`[security] api_key` or `AGORA_API_KEY`),
//! every request except `/health` must carry it:
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```
//!
//! ## Acting Account
//!
//! Credentials and sessions are handled by the upstream gateway, which
//! forwards the authenticated account id in the `x-agora-account` header.
//! Handlers take a [`Principal`] when they need an actor and a
//! [`MaybePrincipal`] when anonymous access is allowed.

use super::AppState;
use super::types::ApiError;
use agora_core::AccountId;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Header carrying the authenticated account id.
pub const ACCOUNT_HEADER: &str = "x-agora-account";

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// Compare two keys in constant time over the longer length.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// API key authentication middleware.
///
/// Only installed when a key is configured. `/health` is always allowed
/// for load balancer checks.
pub async fn api_key_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => {
            let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
            if keys_match(provided, expected) {
                Ok(next.run(request).await)
            } else {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_api_key",
                    "Authentication failed: invalid API key"
                );
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// ACTING ACCOUNT
// =============================================================================

/// Parse the acting account header. `Ok(None)` when absent.
fn account_from_parts(parts: &Parts) -> Result<Option<AccountId>, ApiError> {
    let Some(value) = parts.headers.get(ACCOUNT_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|id| Some(AccountId(id)))
        .ok_or_else(|| ApiError::bad_request(format!("Malformed {} header", ACCOUNT_HEADER)))
}

/// The authenticated acting account. Rejects with 401 when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal(pub AccountId);

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        account_from_parts(parts)?
            .map(Principal)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// The acting account, if the request is authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybePrincipal(pub Option<AccountId>);

impl<S: Send + Sync> FromRequestParts<S> for MaybePrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        account_from_parts(parts).map(MaybePrincipal)
    }
}

// =============================================================================
// TESTS
// =============================================================================
