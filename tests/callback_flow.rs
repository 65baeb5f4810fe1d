//! End-to-end login flows through the assembled router.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use url::Url;
use vetrina::api::handlers::auth::{
    AuthConfig, AuthState, AuthObserver, LoginAttempt,
};
use vetrina::cache::MemoryTokenCache;
use vetrina::provider::{
    ExchangeOutcome, ExchangedUser, IdentityProvider, ProviderError, StrategyRegistry,
};
use vetrina::session::{MemorySessionStore, SessionData, SessionStore};

#[derive(Clone, Copy)]
enum Script {
    Fail,
    User { id: &'static str, new: bool },
    StateMismatch,
}

struct ScriptedProvider(Script);

#[async_trait]
impl IdentityProvider for ScriptedProvider {
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
        match self.0 {
            Script::Fail => Err(ProviderError::Exchange(anyhow!("provider rejected code"))),
            Script::User { id, new } => Ok(ExchangeOutcome {
                user: Some(ExchangedUser {
                    id: id.to_string(),
                    email: None,
                    display_name: None,
                }),
                is_new_user: new,
            }),
            Script::StateMismatch => Err(ProviderError::StateMismatch(
                "state does not match".to_string(),
            )),
        }
    }
}

#[derive(Default)]
struct TestObserver {
    attempts: Mutex<Vec<LoginAttempt>>,
    warnings: Mutex<Vec<String>>,
    session_errors: Mutex<Vec<String>>,
}

impl AuthObserver for TestObserver {
    fn record_login_attempt(&self, attempt: &LoginAttempt) {
        self.attempts.lock().unwrap().push(attempt.clone());
    }

    fn record_session_error(&self, context: &str) {
        self.session_errors.lock().unwrap().push(context.to_string());
    }

    fn add_active_session(&self) {}

    fn remove_active_session(&self) {}

    fn session_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

struct Harness {
    app: Router,
    store: Arc<MemorySessionStore>,
    observer: Arc<TestObserver>,
}

fn harness(script: Script) -> Result<Harness> {
    let store = Arc::new(MemorySessionStore::new());
    let observer = Arc::new(TestObserver::default());
    let strategies = StrategyRegistry::new()
        .with_strategy("oidc:vetrina.shop", Arc::new(ScriptedProvider(script)));
    let state = Arc::new(AuthState::new(
        AuthConfig::new("https://vetrina.shop".to_string())
            .with_persistence_settle_delay_ms(0),
        strategies,
        store.clone(),
        Arc::new(MemoryTokenCache::new()),
        observer.clone(),
    ));
    Ok(Harness {
        app: vetrina::api::app(state)?,
        store,
        observer,
    })
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn seed_session(store: &MemorySessionStore, id: &str, user: Option<&str>) -> Result<()> {
    let mut data = SessionData::new();
    if let Some(user) = user {
        data.set_user_id(user);
    }
    store.save(id, &data).await?;
    Ok(())
}

fn get(uri: &str, cookie: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    Ok(builder.body(Body::empty())?)
}

#[tokio::test]
async fn login_redirects_into_the_provider() -> Result<()> {
    let harness = harness(Script::User {
        id: "user-1",
        new: false,
    })?;

    let response = harness.app.oneshot(get("/api/login", None)?).await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("https://idp.test/authorize?state="));
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.starts_with("vetrina_session="));
    assert!(cookie.contains("HttpOnly"));
    Ok(())
}

#[tokio::test]
async fn new_user_lands_on_the_welcome_page() -> Result<()> {
    let harness = harness(Script::User {
        id: "user-2",
        new: true,
    })?;
    seed_session(&harness.store, "sid-new", None).await?;

    let response = harness
        .app
        .oneshot(get(
            "/api/callback?code=abc&state=xyz",
            Some("vetrina_session=sid-new"),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/subscription?welcome=true");

    let stored = harness.store.load("sid-new").await?.unwrap_or_default();
    assert_eq!(stored.user_id(), Some("user-2"));
    Ok(())
}

#[tokio::test]
async fn returning_user_survives_a_verification_miss() -> Result<()> {
    let harness = harness(Script::User {
        id: "user-3",
        new: false,
    })?;
    // Writes are silently dropped: the login save "succeeds" but read-back
    // finds nothing.
    harness.store.set_drop_writes(true);

    let response = harness
        .app
        .oneshot(get("/api/callback?code=abc&state=xyz", None)?)
        .await?;

    assert_eq!(location(&response), "/");
    assert!(!harness.observer.warnings.lock().unwrap().is_empty());
    assert!(
        harness
            .observer
            .session_errors
            .lock()
            .unwrap()
            .iter()
            .any(|entry| entry.contains("unverified"))
    );
    Ok(())
}

#[tokio::test]
async fn callback_alias_serves_the_same_flow() -> Result<()> {
    let harness = harness(Script::Fail)?;

    let response = harness
        .app
        .oneshot(get("/api/auth/callback?code=abc&state=xyz", None)?)
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login-error?reason=auth_failed");
    assert_eq!(harness.observer.attempts.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn first_mismatch_on_empty_session_forces_a_restart() -> Result<()> {
    let harness = harness(Script::StateMismatch)?;
    seed_session(&harness.store, "sid-m", None).await?;

    let response = harness
        .app
        .oneshot(get(
            "/api/callback?code=abc&state=xyz",
            Some("vetrina_session=sid-m"),
        )?)
        .await?;

    assert_eq!(
        location(&response),
        "/login-error?reason=session_corrupt&action=restart"
    );
    assert!(harness.store.load("sid-m").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn csrf_token_guards_mutating_requests() -> Result<()> {
    let harness = harness(Script::Fail)?;
    seed_session(&harness.store, "sid-c", Some("user-4")).await?;
    let cookie = "vetrina_session=sid-c";

    // Logging out without a token is rejected with the missing-token code.
    let response = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/logout")
                .header(header::COOKIE, cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response.into_body().collect().await?.to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(error["error"], "csrf_token_missing");

    // Fetch a token for the session.
    let response = harness
        .app
        .clone()
        .oneshot(get("/api/csrf-token", Some(cookie))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await?.to_bytes();
    let payload: serde_json::Value = serde_json::from_slice(&body)?;
    let token = payload["csrfToken"]
        .as_str()
        .ok_or_else(|| anyhow!("missing csrfToken field"))?
        .to_string();

    // A wrong token is a distinct rejection.
    let response = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/logout")
                .header(header::COOKIE, cookie)
                .header("x-csrf-token", "wrong")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response.into_body().collect().await?.to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(error["error"], "csrf_token_invalid");

    // The real token passes and the logout destroys the session.
    let response = harness
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/logout")
                .header(header::COOKIE, cookie)
                .header("x-csrf-token", token)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    assert!(harness.store.load("sid-c").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn anonymous_get_requests_bypass_csrf() -> Result<()> {
    let harness = harness(Script::Fail)?;

    let response = harness.app.oneshot(get("/health", None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
