//! Login entrypoint: issues state and redirects into the provider.

use anyhow::Context;
use axum::{extract::Extension, http::HeaderMap, response::Response};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use std::sync::Arc;
use tracing::{error, warn};

use super::session::{attach_session, redirect, session_cookie};
use super::state::AuthState;
use super::strategy::{request_host, select_strategy};
use super::types::{FailureReason, LoginFailure};

/// Anti-CSRF state bound into the authorization redirect and kept in the
/// session for the callback comparison.
fn generate_state() -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate oauth state")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

#[utoipa::path(
    get,
    path = "/api/login",
    responses(
        (status = 302, description = "Redirect into the provider authorization endpoint, or to the error page on failure")
    ),
    tag = "auth"
)]
pub async fn login(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let config = auth_state.config();
    let strategy_id = select_strategy(
        config.strategy_prefix(),
        request_host(&headers),
        config.default_host(),
    );

    let mut session = match attach_session(&headers, auth_state.store()).await {
        Ok(session) => session,
        Err(err) => {
            error!("failed to attach session for login: {err}");
            auth_state
                .observer()
                .record_session_error("login session attach failed");
            return redirect(
                &LoginFailure::new(FailureReason::SessionFailed).redirect_url(),
                None,
            );
        }
    };
    let cookie = if session.created {
        session_cookie(config, &session.id).ok()
    } else {
        None
    };

    let provider = match auth_state.strategies().resolve(&strategy_id) {
        Ok(provider) => provider,
        Err(err) => {
            warn!("login with unregistered strategy: {err}");
            return redirect(
                &LoginFailure::new(FailureReason::AuthFailed).redirect_url(),
                cookie,
            );
        }
    };

    let state = match generate_state() {
        Ok(state) => state,
        Err(err) => {
            error!("{err}");
            return redirect(
                &LoginFailure::new(FailureReason::AuthFailed).redirect_url(),
                cookie,
            );
        }
    };

    // The issued state must be durable before the user leaves for the
    // provider, or the callback comparison can never succeed.
    session.data.set_oauth_state(&state);
    if let Err(err) = auth_state.store().save(&session.id, &session.data).await {
        error!("failed to persist oauth state: {err}");
        auth_state
            .observer()
            .record_session_error("login state write failed");
        return redirect(
            &LoginFailure::new(FailureReason::SessionFailed).redirect_url(),
            cookie,
        );
    }

    match provider.authorization_url(&state) {
        Ok(url) => redirect(url.as_str(), cookie),
        Err(err) => {
            error!("failed to build authorization URL: {err}");
            redirect(
                &LoginFailure::new(FailureReason::AuthFailed).redirect_url(),
                cookie,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::metrics::NoopObserver;
    use crate::api::handlers::auth::state::AuthConfig;
    use crate::cache::MemoryTokenCache;
    use crate::provider::{
        ExchangeOutcome, IdentityProvider, ProviderError, StrategyRegistry,
    };
    use crate::session::MemorySessionStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::http::{HeaderValue, StatusCode, header::LOCATION};
    use url::Url;

    struct StubProvider;

    #[async_trait]
    impl IdentityProvider for StubProvider {
        fn authorization_url(&self, state: &str) -> Result<Url, ProviderError> {
            Url::parse(&format!("https://idp.test/authorize?state={state}"))
                .map_err(|err| ProviderError::Exchange(err.into()))
        }

        async fn exchange(
            &self,
            _code: &str,
            _state: &str,
            _expected_state: Option<&str>,
        ) -> Result<ExchangeOutcome, ProviderError> {
            Ok(ExchangeOutcome::default())
        }
    }

    fn auth_state(store: Arc<MemorySessionStore>) -> Arc<AuthState> {
        let registry = StrategyRegistry::new()
            .with_strategy("oidc:shop.example", Arc::new(StubProvider));
        Arc::new(AuthState::new(
            AuthConfig::new("https://shop.example".to_string())
                .with_default_host("shop.example".to_string()),
            registry,
            store,
            Arc::new(MemoryTokenCache::new()),
            Arc::new(NoopObserver),
        ))
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn login_redirects_to_provider_and_persists_state() -> Result<()> {
        let store = Arc::new(MemorySessionStore::new());
        let state = auth_state(store.clone());
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("shop.example"));

        let response = login(headers, Extension(state)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let target = location(&response);
        assert!(target.starts_with("https://idp.test/authorize?state="));

        // The issued state is in the store under the new session id.
        assert_eq!(store.session_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn login_for_unknown_host_fails_closed() {
        let store = Arc::new(MemorySessionStore::new());
        let state = auth_state(store);
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("other.example"));

        let response = login(headers, Extension(state)).await;
        assert_eq!(location(&response), "/login-error?reason=auth_failed");
    }

    #[tokio::test]
    async fn login_with_failing_store_reports_session_failure() {
        let store = Arc::new(MemorySessionStore::new());
        store.set_fail_saves(true);
        let state = auth_state(store);
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("shop.example"));

        let response = login(headers, Extension(state)).await;
        assert_eq!(location(&response), "/login-error?reason=session_failed");
    }
}
