//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, oidc};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let auth_opts = auth::Options::parse(matches)?;
    let oidc_opts = oidc::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        frontend_base_url: auth_opts.frontend_base_url,
        default_host: auth_opts.default_host,
        strategy_prefix: auth_opts.strategy_prefix,
        oauth_hosts: auth_opts.oauth_hosts,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        csrf_ttl_seconds: auth_opts.csrf_ttl_seconds,
        persistence_settle_delay_ms: auth_opts.persistence_settle_delay_ms,
        exchange_timeout_seconds: auth_opts.exchange_timeout_seconds,
        oidc_client_id: oidc_opts.client_id,
        oidc_client_secret: oidc_opts.client_secret,
        oidc_auth_url: oidc_opts.auth_url,
        oidc_token_url: oidc_opts.token_url,
        oidc_userinfo_url: oidc_opts.userinfo_url,
        oidc_redirect_url: oidc_opts.redirect_url,
    }))
}
