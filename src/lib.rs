//! # Vetrina (Marketplace Auth & Session Service)
//!
//! `vetrina` is the authentication core of the Vetrina marketplace. It owns
//! the OAuth login/callback pipeline, session-persistence verification, and
//! the CSRF protection layered around state-changing requests.
//!
//! ## Login pipeline
//!
//! Each callback request runs one linear async task:
//! strategy selection → authorization-code exchange → session login →
//! persistence verification → redirect. Every invocation ends in exactly one
//! redirect and emits exactly one login-attempt record.
//!
//! - **Multi-domain strategies:** the provider strategy is derived from the
//!   request `Host` header (`<prefix>:<host>`, port stripped), so one
//!   deployment can serve several storefront domains.
//! - **Persistence verification:** after a session login the service reads
//!   the session back from the store before trusting it. Verification
//!   failures are logged and metered but never block the user; stranding a
//!   correctly-authenticated user on a transient store race costs more than
//!   occasionally redirecting with a not-yet-durable session.
//! - **State-mismatch recovery:** provider state-verification failures go
//!   through a three-way recovery decision instead of surfacing raw errors:
//!   throttle rapid retries, destroy near-empty corrupted sessions, or hand
//!   back a recoverable error page.
//!
//! ## CSRF
//!
//! One active token per session, 15-minute expiry, cache-backed. Validation
//! fails open when the cache is unreachable: CSRF protection degrades rather
//! than taking the whole storefront down with the cache.

pub mod api;
pub mod cache;
pub mod cli;
pub mod provider;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
