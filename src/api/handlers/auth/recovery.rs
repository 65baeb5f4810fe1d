//! Graceful recovery for OAuth state-verification failures.
//!
//! A state mismatch usually means a lost or stale session cookie, not an
//! attack. Instead of surfacing a raw error, the callback pipeline runs a
//! three-way decision: throttle rapid retries, destroy near-empty corrupted
//! sessions so the user can start clean, or hand back a plain mismatch page
//! when the session looks healthy (a cookie/browser-policy problem outside
//! the server's control).

use super::metrics::AuthObserver;
use super::types::{FailureReason, LoginFailure};
use crate::session::{SessionData, SessionStore};

/// A marker younger than this means a rapid retry; recovery would feed a
/// retry storm.
const RETRY_WINDOW_SECONDS: u64 = 2 * 60;

/// Sessions with fewer top-level keys than this are treated as corrupted or
/// empty shells.
const MIN_POPULATED_KEYS: usize = 3;

/// Markers older than this are garbage, removed on any auth-path touch.
const MARKER_MAX_AGE_SECONDS: u64 = 10 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Recent attempt marker found; no recovery, user-visible recoverable error.
    Throttled,
    /// Session was a near-empty shell; destroyed store-side for a clean restart.
    SessionDestroyed,
    /// Session looks populated; nothing server-side to fix.
    NotRecoverable,
}

/// Decide and apply recovery for a state-mismatch failure.
pub async fn recover_state_mismatch(
    store: &dyn SessionStore,
    observer: &dyn AuthObserver,
    session_id: &str,
    data: &SessionData,
    now: u64,
) -> RecoveryOutcome {
    if let Some(marker) = data.oauth_attempt() {
        if marker.age_seconds(now) < RETRY_WINDOW_SECONDS {
            return RecoveryOutcome::Throttled;
        }
    }

    if data.len() < MIN_POPULATED_KEYS {
        if let Err(err) = store.destroy(session_id).await {
            // The redirect still tells the user to restart; the stale record
            // expires on its own TTL.
            observer.record_session_error(&format!(
                "failed to destroy corrupted session {session_id}: {err}"
            ));
        }
        return RecoveryOutcome::SessionDestroyed;
    }

    RecoveryOutcome::NotRecoverable
}

/// Terminal redirect for a recovery outcome.
#[must_use]
pub fn failure_for(outcome: RecoveryOutcome) -> LoginFailure {
    match outcome {
        RecoveryOutcome::Throttled => {
            LoginFailure::new(FailureReason::StateMismatch).recoverable()
        }
        RecoveryOutcome::SessionDestroyed => {
            LoginFailure::new(FailureReason::SessionCorrupt).with_action("restart")
        }
        RecoveryOutcome::NotRecoverable => LoginFailure::new(FailureReason::StateMismatch),
    }
}

/// Drop an attempt marker past its useful life. Returns whether the session
/// changed and needs a save. Bounds session payload growth; hygiene, not
/// security.
pub fn clear_stale_marker(data: &mut SessionData, now: u64) -> bool {
    match data.oauth_attempt() {
        Some(marker) if marker.age_seconds(now) > MARKER_MAX_AGE_SECONDS => {
            data.clear_oauth_attempt();
            true
        }
        _ => false,
    }
}
