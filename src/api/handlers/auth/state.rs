//! Auth configuration and shared state.

use std::sync::Arc;
use std::time::Duration;

use super::metrics::AuthObserver;
use crate::cache::TokenCache;
use crate::provider::StrategyRegistry;
use crate::session::SessionStore;

const DEFAULT_STRATEGY_PREFIX: &str = "oidc";
const DEFAULT_HOST: &str = "vetrina.shop";
const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_CSRF_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_SETTLE_DELAY_MS: u64 = 150;
const DEFAULT_EXCHANGE_TIMEOUT_SECONDS: u64 = 10;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    strategy_prefix: String,
    default_host: String,
    session_ttl_seconds: i64,
    csrf_ttl_seconds: u64,
    persistence_settle_delay_ms: u64,
    exchange_timeout_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            strategy_prefix: DEFAULT_STRATEGY_PREFIX.to_string(),
            default_host: DEFAULT_HOST.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            csrf_ttl_seconds: DEFAULT_CSRF_TTL_SECONDS,
            persistence_settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            exchange_timeout_seconds: DEFAULT_EXCHANGE_TIMEOUT_SECONDS,
        }
    }

    #[must_use]
    pub fn with_strategy_prefix(mut self, prefix: String) -> Self {
        self.strategy_prefix = prefix;
        self
    }

    #[must_use]
    pub fn with_default_host(mut self, host: String) -> Self {
        self.default_host = host;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_csrf_ttl_seconds(mut self, seconds: u64) -> Self {
        self.csrf_ttl_seconds = seconds;
        self
    }

    /// Settle delay before persistence verification; tests run this at zero.
    #[must_use]
    pub fn with_persistence_settle_delay_ms(mut self, millis: u64) -> Self {
        self.persistence_settle_delay_ms = millis;
        self
    }

    #[must_use]
    pub fn with_exchange_timeout_seconds(mut self, seconds: u64) -> Self {
        self.exchange_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn strategy_prefix(&self) -> &str {
        &self.strategy_prefix
    }

    #[must_use]
    pub fn default_host(&self) -> &str {
        &self.default_host
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn csrf_ttl(&self) -> Duration {
        Duration::from_secs(self.csrf_ttl_seconds)
    }

    #[must_use]
    pub fn persistence_settle_delay(&self) -> Duration {
        Duration::from_millis(self.persistence_settle_delay_ms)
    }

    #[must_use]
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_seconds)
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    strategies: StrategyRegistry,
    store: Arc<dyn SessionStore>,
    cache: Arc<dyn TokenCache>,
    observer: Arc<dyn AuthObserver>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        strategies: StrategyRegistry,
        store: Arc<dyn SessionStore>,
        cache: Arc<dyn TokenCache>,
        observer: Arc<dyn AuthObserver>,
    ) -> Self {
        Self {
            config,
            strategies,
            store,
            cache,
            observer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    #[must_use]
    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn cache(&self) -> &dyn TokenCache {
        self.cache.as_ref()
    }

    #[must_use]
    pub fn observer(&self) -> &dyn AuthObserver {
        self.observer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::metrics::NoopObserver;
    use crate::cache::MemoryTokenCache;
    use crate::session::MemorySessionStore;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://vetrina.shop".to_string());

        assert_eq!(config.frontend_base_url(), "https://vetrina.shop");
        assert_eq!(config.strategy_prefix(), DEFAULT_STRATEGY_PREFIX);
        assert_eq!(config.default_host(), DEFAULT_HOST);
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert_eq!(config.csrf_ttl(), Duration::from_secs(900));
        assert_eq!(config.persistence_settle_delay(), Duration::from_millis(150));
        assert!(config.session_cookie_secure());

        let config = config
            .with_strategy_prefix("sso".to_string())
            .with_default_host("market.example".to_string())
            .with_session_ttl_seconds(3600)
            .with_csrf_ttl_seconds(60)
            .with_persistence_settle_delay_ms(0)
            .with_exchange_timeout_seconds(3);

        assert_eq!(config.strategy_prefix(), "sso");
        assert_eq!(config.default_host(), "market.example");
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert_eq!(config.csrf_ttl(), Duration::from_secs(60));
        assert_eq!(config.persistence_settle_delay(), Duration::ZERO);
        assert_eq!(config.exchange_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn insecure_frontend_disables_secure_cookie() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn auth_state_exposes_collaborators() {
        let state = AuthState::new(
            AuthConfig::new("https://vetrina.shop".to_string()),
            StrategyRegistry::new(),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryTokenCache::new()),
            Arc::new(NoopObserver),
        );
        assert!(state.strategies().is_empty());
        assert_eq!(state.config().default_host(), DEFAULT_HOST);
    }
}
