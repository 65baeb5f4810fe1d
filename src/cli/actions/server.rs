use crate::{
    api,
    api::handlers::auth::{AuthConfig, AuthState, TracingObserver, select_strategy},
    cache::MemoryTokenCache,
    provider::{MemoryUserDirectory, OidcConfig, OidcProvider, StrategyRegistry, UserDirectory},
    session::MemorySessionStore,
};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub frontend_base_url: String,
    pub default_host: String,
    pub strategy_prefix: String,
    pub oauth_hosts: Vec<String>,
    pub session_ttl_seconds: i64,
    pub csrf_ttl_seconds: u64,
    pub persistence_settle_delay_ms: u64,
    pub exchange_timeout_seconds: u64,
    pub oidc_client_id: String,
    pub oidc_client_secret: SecretString,
    pub oidc_auth_url: String,
    pub oidc_token_url: String,
    pub oidc_userinfo_url: String,
    pub oidc_redirect_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the provider configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let oidc_config = OidcConfig {
        client_id: args.oidc_client_id,
        client_secret: args.oidc_client_secret,
        auth_url: args.oidc_auth_url,
        token_url: args.oidc_token_url,
        userinfo_url: args.oidc_userinfo_url,
        redirect_url: args.oidc_redirect_url,
    };

    // All storefront hosts share one provider and one user directory; the
    // registry keys them by the host-derived strategy id.
    let directory: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
    let provider = Arc::new(OidcProvider::new(&oidc_config, directory)?);

    let mut strategies = StrategyRegistry::new();
    for host in &args.oauth_hosts {
        let strategy_id = select_strategy(&args.strategy_prefix, Some(host), &args.default_host);
        info!("registering OAuth strategy {strategy_id}");
        strategies.register(&strategy_id, provider.clone());
    }

    let config = AuthConfig::new(args.frontend_base_url)
        .with_strategy_prefix(args.strategy_prefix)
        .with_default_host(args.default_host)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_csrf_ttl_seconds(args.csrf_ttl_seconds)
        .with_persistence_settle_delay_ms(args.persistence_settle_delay_ms)
        .with_exchange_timeout_seconds(args.exchange_timeout_seconds);

    let auth_state = Arc::new(AuthState::new(
        config,
        strategies,
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryTokenCache::new()),
        Arc::new(TracingObserver::new()),
    ));

    api::new(args.port, auth_state).await
}
