//! Observability port for the auth pipeline.
//!
//! Handlers never talk to a metrics singleton; they receive an
//! [`AuthObserver`] at construction so unit tests stay deterministic.

use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failure,
}

impl LoginOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// One record per callback invocation; created once, emitted, never mutated.
#[derive(Clone, Debug)]
pub struct LoginAttempt {
    pub outcome: LoginOutcome,
    pub duration_ms: u64,
    pub user_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl LoginAttempt {
    #[must_use]
    pub fn success(duration_ms: u64, user_id: &str) -> Self {
        Self {
            outcome: LoginOutcome::Success,
            duration_ms,
            user_id: Some(user_id.to_string()),
            failure_reason: None,
        }
    }

    #[must_use]
    pub fn failure(duration_ms: u64, reason: &str) -> Self {
        Self {
            outcome: LoginOutcome::Failure,
            duration_ms,
            user_id: None,
            failure_reason: Some(reason.to_string()),
        }
    }
}

/// Write-only observer consumed by the auth core.
pub trait AuthObserver: Send + Sync {
    fn record_login_attempt(&self, attempt: &LoginAttempt);
    fn record_session_error(&self, context: &str);
    fn add_active_session(&self);
    fn remove_active_session(&self);
    /// Structured warning channel for the persistence verifier and other
    /// recovered-locally paths.
    fn session_warning(&self, message: &str);
}

/// Production observer: everything flows through `tracing`, where the
/// collector pipeline picks it up.
pub struct TracingObserver {
    active_sessions: AtomicI64,
}

impl TracingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active_sessions: AtomicI64::new(0),
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthObserver for TracingObserver {
    fn record_login_attempt(&self, attempt: &LoginAttempt) {
        info!(
            outcome = attempt.outcome.as_str(),
            duration_ms = attempt.duration_ms,
            user_id = attempt.user_id.as_deref().unwrap_or("-"),
            failure_reason = attempt.failure_reason.as_deref().unwrap_or("-"),
            "login attempt"
        );
    }

    fn record_session_error(&self, context: &str) {
        warn!(context, "session store error");
    }

    fn add_active_session(&self) {
        let active = self.active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
        info!(active, "session opened");
    }

    fn remove_active_session(&self) {
        let active = self.active_sessions.fetch_sub(1, Ordering::Relaxed) - 1;
        info!(active, "session closed");
    }

    fn session_warning(&self, message: &str) {
        warn!("{message}");
    }
}

/// Discards everything; placeholder wiring for tools that do not observe.
pub struct NoopObserver;

impl AuthObserver for NoopObserver {
    fn record_login_attempt(&self, _attempt: &LoginAttempt) {}
    fn record_session_error(&self, _context: &str) {}
    fn add_active_session(&self) {}
    fn remove_active_session(&self) {}
    fn session_warning(&self, _message: &str) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{AuthObserver, LoginAttempt};
    use std::sync::Mutex;

    /// Captures every emission for assertion in unit tests.
    #[derive(Default)]
    pub struct CapturingObserver {
        pub attempts: Mutex<Vec<LoginAttempt>>,
        pub session_errors: Mutex<Vec<String>>,
        pub warnings: Mutex<Vec<String>>,
    }

    impl CapturingObserver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn attempt_count(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }

        pub fn warning_count(&self) -> usize {
            self.warnings.lock().unwrap().len()
        }
    }

    impl AuthObserver for CapturingObserver {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_attempt_constructors_set_outcome() {
        let success = LoginAttempt::success(12, "user-1");
        assert_eq!(success.outcome, LoginOutcome::Success);
        assert_eq!(success.user_id.as_deref(), Some("user-1"));
        assert_eq!(success.failure_reason, None);

        let failure = LoginAttempt::failure(34, "no user returned");
        assert_eq!(failure.outcome, LoginOutcome::Failure);
        assert_eq!(failure.failure_reason.as_deref(), Some("no user returned"));
        assert_eq!(failure.user_id, None);
    }

    #[test]
    fn outcome_strings_are_stable() {
        assert_eq!(LoginOutcome::Success.as_str(), "success");
        assert_eq!(LoginOutcome::Failure.as_str(), "failure");
    }
}
