//! Session persistence verification.
//!
//! After a session login the callback handler confirms the identity write
//! actually landed in the store before trusting it. The check is advisory:
//! callers log and meter a negative result but never block the user on it.

use std::time::Duration;

use super::metrics::AuthObserver;
use crate::session::{SessionData, SessionStore};

/// Confirm that `expected_user_id` was durably bound to `session_id`.
///
/// The settle delay is a pragmatic concession to eventually-consistent
/// stores, not a correctness guarantee. Read-back errors fail open: the user
/// is not penalized for a monitoring-path failure. Idempotent; the only side
/// effect is one structured warning per negative or fail-open path.
pub async fn verify_persistence(
    store: &dyn SessionStore,
    observer: &dyn AuthObserver,
    settle_delay: Duration,
    session: Option<&SessionData>,
    session_id: &str,
    expected_user_id: &str,
) -> bool {
    if settle_delay > Duration::ZERO {
        tokio::time::sleep(settle_delay).await;
    }

    let Some(session) = session else {
        observer.session_warning(&format!(
            "persistence check: session object missing for {session_id}"
        ));
        return false;
    };

    let Some(user_id) = session.user_id() else {
        observer.session_warning(&format!(
            "persistence check: no provider identity on session {session_id}"
        ));
        return false;
    };

    if user_id != expected_user_id {
        // Cross-session contamination; the session must not be trusted.
        observer.session_warning(&format!(
            "persistence check: identity mismatch on session {session_id}"
        ));
        return false;
    }

    if !store.supports_read_back() {
        // Best-effort only: nothing more we can check.
        return true;
    }

    match store.read_back(session_id).await {
        Err(err) => {
            observer.session_warning(&format!(
                "persistence check: read-back failed for {session_id}: {err}"
            ));
            true
        }
        Ok(None) => {
            observer.session_warning(&format!(
                "persistence check: session write did not land for {session_id}"
            ));
            false
        }
        Ok(Some(_)) => true,
    }
}
