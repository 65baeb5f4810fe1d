//! Identity-provider seam: strategy registry and the exchange contract.
//!
//! A *strategy* is a named, host-specific provider configuration. The
//! callback pipeline resolves the strategy id derived from the request host
//! and drives the authorization-code exchange through [`IdentityProvider`].
//! Provider protocol internals (token validation, JWKS, PKCE) stay behind
//! the trait; the core only consumes the exchange outcome.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

pub mod directory;
pub mod oidc;

pub use directory::{MaterializedUser, MemoryUserDirectory, ProviderProfile, UserDirectory};
pub use oidc::{OidcConfig, OidcProvider};

/// Identity materialized from a successful exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangedUser {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Result of a completed authorization-code exchange.
///
/// `user` may be `None` when the provider accepted the code but produced no
/// identity; the callback handler treats that as its own terminal state.
#[derive(Clone, Debug, Default)]
pub struct ExchangeOutcome {
    pub user: Option<ExchangedUser>,
    pub is_new_user: bool,
}

#[derive(Debug)]
pub enum ProviderError {
    /// The `state` returned by the provider does not match what was issued.
    StateMismatch(String),
    /// No strategy registered under the requested id.
    Unsupported(String),
    /// The exchange itself failed (provider rejection, network, timeout).
    Exchange(anyhow::Error),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateMismatch(detail) => {
                write!(f, "unable to verify authorization state: {detail}")
            }
            Self::Unsupported(strategy) => write!(f, "unsupported provider: {strategy}"),
            Self::Exchange(err) => write!(f, "authorization code exchange failed: {err}"),
        }
    }
}

impl std::error::Error for ProviderError {}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider authorization endpoint with the given anti-CSRF state bound in.
    fn authorization_url(&self, state: &str) -> Result<Url, ProviderError>;

    /// Drive the authorization-code exchange to an outcome.
    ///
    /// `expected_state` is the value issued at login time (absent when the
    /// session carries none); implementations must report a mismatch as
    /// [`ProviderError::StateMismatch`], never as a generic exchange error.
    async fn exchange(
        &self,
        code: &str,
        state: &str,
        expected_state: Option<&str>,
    ) -> Result<ExchangeOutcome, ProviderError>;
}

/// Strategy id → provider configuration.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl StrategyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy_id: &str, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(strategy_id.to_string(), provider);
        self
    }

    pub fn register(&mut self, strategy_id: &str, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(strategy_id.to_string(), provider);
    }

    /// # Errors
    /// Returns [`ProviderError::Unsupported`] when no strategy is registered
    /// under `strategy_id`.
    pub fn resolve(&self, strategy_id: &str) -> Result<Arc<dyn IdentityProvider>, ProviderError> {
        self.providers
            .get(strategy_id)
            .cloned()
            .ok_or_else(|| ProviderError::Unsupported(strategy_id.to_string()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
