//! API handlers for the vetrina auth service.
//!
//! Route handlers are grouped by concern: `auth` carries the OAuth login
//! pipeline and CSRF service, `health` the liveness endpoint.

pub mod auth;
pub mod health;
