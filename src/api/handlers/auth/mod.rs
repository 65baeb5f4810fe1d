//! Auth handlers and supporting modules.
//!
//! This module coordinates the OAuth login pipeline, session persistence,
//! and CSRF protection.
//!
//! ## Login pipeline
//!
//! `/api/login` resolves a provider strategy from the request `Host` header
//! (`<prefix>:<host>`, port stripped), issues an anti-CSRF state, and
//! redirects into the provider. `/api/callback` drives the code exchange,
//! binds the identity to the session, verifies the write actually landed in
//! the store, and ends in exactly one redirect.
//!
//! ## Failure policy
//!
//! Every failure is a redirect to the error page with a machine-readable
//! `reason` code; internal errors never leak past this module. Persistence
//! verification and CSRF validation fail open: a monitoring or cache outage
//! degrades protection instead of blocking logins.

pub(crate) mod callback;
pub(crate) mod csrf;
pub(crate) mod login;
pub(crate) mod metrics;
mod recovery;
pub(crate) mod session;
mod state;
mod strategy;
pub(crate) mod types;
mod verify;

pub use callback::callback;
pub use csrf::{ERROR_TOKEN_INVALID, ERROR_TOKEN_MISSING, csrf_token, enforce};
pub use login::login;
pub use metrics::{AuthObserver, LoginAttempt, LoginOutcome, NoopObserver, TracingObserver};
pub use session::logout;
pub use state::{AuthConfig, AuthState};
pub use strategy::select_strategy;
pub use types::{FailureReason, LoginFailure, RedactedDebug};
pub use verify::verify_persistence;
