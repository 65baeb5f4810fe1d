//! OAuth2/OIDC provider client built on the `oauth2` crate.
//!
//! One instance per strategy. The authorization-code mechanics are delegated
//! to `oauth2`; this module only binds the session-issued state, fetches the
//! userinfo document, and materializes the subject through a
//! [`UserDirectory`].

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient, reqwest::async_http_client,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use super::{
    ExchangeOutcome, ExchangedUser, IdentityProvider, ProviderError, ProviderProfile, UserDirectory,
};

#[derive(Clone)]
pub struct OidcConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_url: String,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

pub struct OidcProvider {
    client: BasicClient,
    http: reqwest::Client,
    userinfo_url: Url,
    directory: Arc<dyn UserDirectory>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

impl OidcProvider {
    /// # Errors
    /// Returns an error if any endpoint URL in `config` is invalid.
    pub fn new(config: &OidcConfig, directory: Arc<dyn UserDirectory>) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(
                config.client_secret.expose_secret().to_string(),
            )),
            AuthUrl::new(config.auth_url.clone()).context("invalid authorization URL")?,
            Some(TokenUrl::new(config.token_url.clone()).context("invalid token URL")?),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_url.clone()).context("invalid redirect URL")?,
        );
        let userinfo_url =
            Url::parse(&config.userinfo_url).context("invalid userinfo endpoint URL")?;
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build userinfo HTTP client")?;
        Ok(Self {
            client,
            http,
            userinfo_url,
            directory,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Option<ProviderProfile>> {
        let response = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .context("userinfo request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("userinfo returned {}", response.status()));
        }
        let info: UserInfo = response
            .json()
            .await
            .context("userinfo response was not valid JSON")?;
        Ok(info.sub.map(|subject| ProviderProfile {
            subject,
            email: info.email,
            display_name: info.name,
        }))
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn authorization_url(&self, state: &str) -> Result<Url, ProviderError> {
        let (url, _state) = self
            .client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .url();
        Ok(url)
    }

    async fn exchange(
        &self,
        code: &str,
        state: &str,
        expected_state: Option<&str>,
    ) -> Result<ExchangeOutcome, ProviderError> {
        // State is compared before the code is spent; a stale or forged
        // state must not consume the single-use authorization code.
        match expected_state {
            Some(expected) if expected == state => {}
            Some(_) => {
                return Err(ProviderError::StateMismatch(
                    "session state does not match callback state".to_string(),
                ));
            }
            None => {
                return Err(ProviderError::StateMismatch(
                    "session carries no issued state".to_string(),
                ));
            }
        }

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|err| ProviderError::Exchange(anyhow!(err)))?;

        let profile = self
            .fetch_profile(token.access_token().secret())
            .await
            .map_err(ProviderError::Exchange)?;

        let Some(profile) = profile else {
            // Token exchange succeeded but no identity materialized.
            return Ok(ExchangeOutcome::default());
        };

        let materialized = self
            .directory
            .materialize(&profile)
            .await
            .map_err(ProviderError::Exchange)?;

        Ok(ExchangeOutcome {
            user: Some(ExchangedUser {
                id: materialized.user_id,
                email: profile.email,
                display_name: profile.display_name,
            }),
            is_new_user: materialized.is_new,
        })
    }
}
