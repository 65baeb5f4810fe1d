//! OAuth callback orchestration.
//!
//! One linear async pass per invocation: exchange → session login →
//! persistence verification → redirect. The handler always terminates in
//! exactly one 302 and emits exactly one login-attempt record; no failure
//! propagates past this boundary.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, HeaderValue},
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::metrics::{AuthObserver, LoginAttempt};
use super::recovery::{RecoveryOutcome, clear_stale_marker, failure_for, recover_state_mismatch};
use super::session::{RequestSession, attach_session, redirect, session_cookie};
use super::state::AuthState;
use super::strategy::{request_host, select_strategy};
use super::types::{
    CallbackQuery, FailureReason, LANDING_DESTINATION, LoginFailure, RedactedDebug,
    WELCOME_DESTINATION,
};
use super::verify::verify_persistence;
use crate::provider::ProviderError;
use crate::session::{OAuthAttempt, SessionStore, unix_now};

/// Length of the code/state previews kept in the attempt marker. Raw values
/// never enter the session.
const PREVIEW_LEN: usize = 8;

#[utoipa::path(
    get,
    path = "/api/callback",
    params(
        ("code" = Option<String>, Query, description = "Authorization code returned by the provider"),
        ("state" = Option<String>, Query, description = "Anti-CSRF state echoed by the provider")
    ),
    responses(
        (status = 302, description = "Terminal redirect: landing page, onboarding, or the error page with a reason code")
    ),
    tag = "auth"
)]
pub async fn callback(
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let started = Instant::now();
    let config = auth_state.config();
    let observer = auth_state.observer();
    let store = auth_state.store();

    let host = request_host(&headers);
    let strategy_id = select_strategy(config.strategy_prefix(), host, config.default_host());

    let mut session = match attach_session(&headers, store).await {
        Ok(session) => session,
        Err(err) => {
            warn!("failed to attach session for callback: {err}");
            observer.record_session_error("callback session attach failed");
            return finish_failure(
                observer,
                started,
                "session unavailable",
                &LoginFailure::new(FailureReason::SessionFailed),
                None,
            );
        }
    };
    let cookie = if session.created {
        session_cookie(config, &session.id).ok()
    } else {
        None
    };

    let now = unix_now();
    let mut dirty = clear_stale_marker(&mut session.data, now);
    // Recovery decisions look at the session as it arrived, not at the
    // marker this very request writes. A first mismatch must never be
    // throttled by its own marker.
    let arrived = session.data.clone();

    let code_present = query.code.as_deref().is_some_and(|value| !value.is_empty());
    let state_present = query.state.as_deref().is_some_and(|value| !value.is_empty());

    if code_present && state_present {
        let marker = OAuthAttempt {
            code_preview: preview(query.code.as_deref().unwrap_or_default()),
            state_preview: preview(query.state.as_deref().unwrap_or_default()),
            timestamp: now,
            recovered: false,
        };
        if session.data.set_oauth_attempt(&marker).is_ok() {
            dirty = true;
        }
    }
    if dirty {
        // Best effort; the marker only tunes later recovery decisions.
        if let Err(err) = store.save(&session.id, &session.data).await {
            debug!("could not persist oauth attempt marker: {err}");
        }
    }

    if !code_present || !state_present {
        return finish_failure(
            observer,
            started,
            "missing code or state parameter",
            &LoginFailure::new(FailureReason::AuthFailed),
            cookie,
        );
    }
    let code = query.code.as_deref().unwrap_or_default();
    let state_param = query.state.as_deref().unwrap_or_default();

    let provider = match auth_state.strategies().resolve(&strategy_id) {
        Ok(provider) => provider,
        Err(err) => {
            warn!("callback for unregistered strategy: {err}");
            return finish_failure(
                observer,
                started,
                "unsupported provider",
                &LoginFailure::new(FailureReason::AuthFailed),
                cookie,
            );
        }
    };

    let expected_state = session.data.oauth_state().map(str::to_string);
    let exchange = tokio::time::timeout(
        config.exchange_timeout(),
        provider.exchange(code, state_param, expected_state.as_deref()),
    )
    .await;

    let outcome = match exchange {
        Err(_elapsed) => {
            return finish_failure(
                observer,
                started,
                "exchange timed out",
                &LoginFailure::new(FailureReason::AuthFailed),
                cookie,
            );
        }
        Ok(Err(ProviderError::StateMismatch(detail))) => {
            warn!("state verification failed for {strategy_id}: {detail}");
            let decision =
                recover_state_mismatch(store, observer, &session.id, &arrived, now).await;
            if decision != RecoveryOutcome::SessionDestroyed {
                mark_attempt_recovered(store, &mut session).await;
            }
            return finish_failure(
                observer,
                started,
                "state mismatch",
                &failure_for(decision),
                cookie,
            );
        }
        Ok(Err(err)) => {
            warn!("authorization code exchange failed for {strategy_id}: {err}");
            return finish_failure(
                observer,
                started,
                "exchange failed",
                &LoginFailure::new(FailureReason::AuthFailed),
                cookie,
            );
        }
        Ok(Ok(outcome)) => outcome,
    };

    let Some(user) = outcome.user else {
        let failure = LoginFailure::new(FailureReason::NoUser).with_debug(RedactedDebug {
            host: host.and_then(|value| value.split(':').next()).map(str::to_string),
            strategy: Some(strategy_id),
            code_present,
            state_present,
        });
        return finish_failure(observer, started, "no user returned", &failure, cookie);
    };

    // Session login: bind the identity and retire the spent state.
    session.data.set_user_id(&user.id);
    session.data.clear_oauth_state();
    if let Err(err) = store.save(&session.id, &session.data).await {
        warn!("session login write failed: {err}");
        observer.record_session_error("session login write failed");
        return finish_failure(
            observer,
            started,
            "session login failed",
            &LoginFailure::new(FailureReason::SessionFailed),
            cookie,
        );
    }

    // Verification is advisory: a user who authenticated with the provider
    // is never stranded on a transient store race. Negative results are
    // logged by the verifier and metered here.
    let verified = verify_persistence(
        store,
        observer,
        config.persistence_settle_delay(),
        Some(&session.data),
        &session.id,
        &user.id,
    )
    .await;
    if !verified {
        observer.record_session_error("session persistence unverified after login");
    }

    observer.record_login_attempt(&LoginAttempt::success(elapsed_ms(started), &user.id));
    observer.add_active_session();

    let destination = if outcome.is_new_user {
        WELCOME_DESTINATION
    } else {
        LANDING_DESTINATION
    };
    redirect(destination, cookie)
}

fn preview(value: &str) -> String {
    value.chars().take(PREVIEW_LEN).collect()
}

/// Flag the attempt marker after a mismatch that left the session alive, so
/// a later look at the session shows the mismatch went through recovery.
async fn mark_attempt_recovered(store: &dyn SessionStore, session: &mut RequestSession) {
    let Some(mut marker) = session.data.oauth_attempt() else {
        return;
    };
    marker.recovered = true;
    if session.data.set_oauth_attempt(&marker).is_err() {
        return;
    }
    // Best effort, same as the marker write itself.
    if let Err(err) = store.save(&session.id, &session.data).await {
        debug!("could not persist recovered attempt marker: {err}");
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Record the single failure attempt for this invocation and terminate.
fn finish_failure(
    observer: &dyn AuthObserver,
    started: Instant,
    reason: &str,
    failure: &LoginFailure,
    cookie: Option<HeaderValue>,
) -> Response {
    observer.record_login_attempt(&LoginAttempt::failure(elapsed_ms(started), reason));
    redirect(&failure.redirect_url(), cookie)
}
