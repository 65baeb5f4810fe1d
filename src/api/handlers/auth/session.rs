//! Session cookie plumbing and the logout endpoint.

use anyhow::Result;
use axum::{
    body::Body,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{COOKIE, InvalidHeaderValue, LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use super::state::{AuthConfig, AuthState};
use super::types::LANDING_DESTINATION;
use crate::session::{SESSION_COOKIE_NAME, SessionData, SessionStore, generate_session_id};

/// Session as seen by one request: id, data bag, and whether the id was
/// minted for this request (and therefore needs a `Set-Cookie`).
pub(crate) struct RequestSession {
    pub id: String,
    pub data: SessionData,
    pub created: bool,
}

/// Load the session addressed by the request cookie, creating an empty one
/// (implicitly, as the session layer does on first request) when no cookie
/// is present.
pub(crate) async fn attach_session(
    headers: &HeaderMap,
    store: &dyn SessionStore,
) -> Result<RequestSession> {
    if let Some(id) = extract_session_id(headers) {
        let data = store.load(&id).await?.unwrap_or_default();
        return Ok(RequestSession {
            id,
            data,
            created: false,
        });
    }
    Ok(RequestSession {
        id: generate_session_id()?,
        data: SessionData::new(),
        created: true,
    })
}

/// Session id and logged-in user, when both resolve.
pub(crate) async fn load_authenticated_user(
    headers: &HeaderMap,
    store: &dyn SessionStore,
) -> Option<(String, String)> {
    let session_id = extract_session_id(headers)?;
    let data = match store.load(&session_id).await {
        Ok(data) => data?,
        Err(err) => {
            error!("failed to load session: {err}");
            return None;
        }
    };
    let user_id = data.user_id()?.to_string();
    Some((session_id, user_id))
}

pub(crate) fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

/// Build a secure `HttpOnly` cookie for the session id.
pub(super) fn session_cookie(
    config: &AuthConfig,
    session_id: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    // Only mark cookies secure when the frontend is served over HTTPS.
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// 302 redirect, optionally carrying a `Set-Cookie` header. Every auth flow
/// terminates through this.
pub(super) fn redirect(url: &str, cookie: Option<HeaderValue>) -> Response {
    let mut response = match HeaderValue::from_str(url) {
        Ok(location) => {
            let mut response = (StatusCode::FOUND, Body::empty()).into_response();
            response.headers_mut().insert(LOCATION, location);
            response
        }
        Err(err) => {
            error!("invalid redirect target {url}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };
    if let Some(cookie) = cookie {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 302, description = "Session destroyed, redirect to the storefront")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    if let Some(session_id) = extract_session_id(&headers) {
        let had_user = matches!(
            auth_state.store().load(&session_id).await,
            Ok(Some(data)) if data.user_id().is_some()
        );
        if let Err(err) = auth_state.store().destroy(&session_id).await {
            error!("failed to destroy session: {err}");
            auth_state
                .observer()
                .record_session_error("logout session destroy failed");
        }
        if had_user {
            auth_state.observer().remove_active_session();
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let cookie = clear_session_cookie(auth_state.config()).ok();
    redirect(LANDING_DESTINATION, cookie)
}
