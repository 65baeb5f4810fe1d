//! CSRF token service and enforcement middleware.
//!
//! One active token per session, cache-backed with a 15-minute expiry.
//! Validation fails open when the cache is unreachable: CSRF protection
//! degrades instead of taking the storefront down with the cache. That
//! trade-off is documented behavior, not a bug to tighten.

use anyhow::{Context, Result};
use axum::{
    Json,
    body::Body,
    extract::{Extension, Request},
    http::{HeaderMap, Method, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::form_urlencoded;

use super::session::load_authenticated_user;
use super::state::AuthState;
use super::types::{CsrfErrorResponse, CsrfTokenResponse};
use crate::cache::TokenCache;

const CSRF_KEY_PREFIX: &str = "csrf:";
const HEADER_NAMES: [&str; 2] = ["x-csrf-token", "csrf-token"];
const BODY_FIELDS: [&str; 2] = ["csrfToken", "_csrf"];
const RESPONSE_HEADER: &str = "x-csrf-token";

/// Largest request body the enforcement middleware will buffer while
/// looking for a token field.
const MAX_BUFFERED_BODY_BYTES: usize = 256 * 1024;

/// Machine-readable rejection codes; consumers dispatch on these, not on
/// message text.
pub const ERROR_TOKEN_MISSING: &str = "csrf_token_missing";
pub const ERROR_TOKEN_INVALID: &str = "csrf_token_invalid";

fn cache_key(session_id: &str) -> String {
    format!("{CSRF_KEY_PREFIX}{session_id}")
}

/// Issue a fresh token for the session, overwriting any prior one.
pub async fn issue(cache: &dyn TokenCache, session_id: &str, ttl: Duration) -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate csrf token")?;
    let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    cache.set(&cache_key(session_id), &token, ttl).await?;
    Ok(token)
}

/// Check a presented token against the stored one.
///
/// An unreachable cache passes validation (fail-open); a missing stored
/// token is invalid; otherwise exact match.
pub async fn validate(cache: &dyn TokenCache, session_id: &str, token: &str) -> bool {
    match cache.get(&cache_key(session_id)).await {
        Err(err) => {
            warn!("csrf cache unreachable, validation passes open: {err}");
            true
        }
        Ok(None) => false,
        Ok(Some(stored)) => stored == token,
    }
}

#[utoipa::path(
    get,
    path = "/api/csrf-token",
    responses(
        (status = 200, description = "Fresh CSRF token for the session", body = CsrfTokenResponse),
        (status = 401, description = "No authenticated session")
    ),
    tag = "auth"
)]
pub async fn csrf_token(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some((session_id, _user_id)) = load_authenticated_user(&headers, auth_state.store()).await
    else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match issue(
        auth_state.cache(),
        &session_id,
        auth_state.config().csrf_ttl(),
    )
    .await
    {
        Ok(token) => {
            let mut response = Json(CsrfTokenResponse {
                csrf_token: token.clone(),
            })
            .into_response();
            if let Ok(value) = token.parse() {
                response.headers_mut().insert(RESPONSE_HEADER, value);
            }
            response
        }
        Err(err) => {
            warn!("failed to issue csrf token: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Enforcement layer for state-changing requests.
///
/// Applies only to mutating methods on authenticated sessions. The token is
/// accepted from the `x-csrf-token`/`csrf-token` headers or the
/// `csrfToken`/`_csrf` body fields.
pub async fn enforce(
    auth_state: Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    if !is_mutating(request.method()) {
        return next.run(request).await;
    }

    let Some((session_id, _user_id)) =
        load_authenticated_user(request.headers(), auth_state.store()).await
    else {
        // Anonymous requests are not CSRF targets; downstream auth decides.
        return next.run(request).await;
    };

    let (token, request) = match extract_token(request).await {
        Ok(extracted) => extracted,
        Err(response) => return response,
    };

    let Some(token) = token else {
        return rejection(ERROR_TOKEN_MISSING);
    };

    if validate(auth_state.cache(), &session_id, &token).await {
        next.run(request).await
    } else {
        rejection(ERROR_TOKEN_INVALID)
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn rejection(code: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(CsrfErrorResponse {
            error: code.to_string(),
        }),
    )
        .into_response()
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    HEADER_NAMES.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

/// Pull a token from headers or, failing that, from a buffered JSON/form
/// body. The request is reassembled so downstream handlers still see the
/// body.
async fn extract_token(request: Request) -> Result<(Option<String>, Request), Response> {
    if let Some(token) = header_token(request.headers()) {
        return Ok((Some(token), request));
    }

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("application/json")
        && !content_type.starts_with("application/x-www-form-urlencoded")
    {
        return Ok((None, request));
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BUFFERED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("failed to buffer request body for csrf check: {err}");
            return Err(StatusCode::BAD_REQUEST.into_response());
        }
    };

    let token = if content_type.starts_with("application/json") {
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|value| {
                BODY_FIELDS.iter().find_map(|field| {
                    value
                        .get(*field)
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_string)
                })
            })
    } else {
        form_urlencoded::parse(&bytes)
            .find(|(key, _)| BODY_FIELDS.contains(&key.as_ref()))
            .map(|(_, value)| value.into_owned())
    };

    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}
