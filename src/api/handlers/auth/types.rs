//! Failure taxonomy, redirect construction, and response types.
//!
//! Failure reasons form a closed enum and the debug payload carried on
//! `no_user` redirects is an explicit allow-list of safe fields. Raw
//! authorization codes, state values, and tokens never reach a URL.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use utoipa::ToSchema;

/// Post-login destination for returning users.
pub const LANDING_DESTINATION: &str = "/";
/// First-time users are routed into onboarding.
pub const WELCOME_DESTINATION: &str = "/subscription?welcome=true";
/// User-visible error page; reason codes are appended as query parameters.
pub const ERROR_PAGE: &str = "/login-error";

/// Closed set of login failure reason codes exposed to the frontend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    AuthFailed,
    NoUser,
    SessionFailed,
    StateMismatch,
    SessionCorrupt,
}

impl FailureReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthFailed => "auth_failed",
            Self::NoUser => "no_user",
            Self::SessionFailed => "session_failed",
            Self::StateMismatch => "state_mismatch",
            Self::SessionCorrupt => "session_corrupt",
        }
    }
}

/// Allow-listed, pre-redacted context for `no_user` failures: hostnames and
/// presence booleans only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedactedDebug {
    pub host: Option<String>,
    pub strategy: Option<String>,
    pub code_present: bool,
    pub state_present: bool,
}

/// Typed constructor for the terminal failure redirect.
#[derive(Clone, Debug)]
pub struct LoginFailure {
    reason: FailureReason,
    recoverable: bool,
    action: Option<&'static str>,
    debug: Option<RedactedDebug>,
}

impl LoginFailure {
    #[must_use]
    pub fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            recoverable: false,
            action: None,
            debug: None,
        }
    }

    #[must_use]
    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: &'static str) -> Self {
        self.action = Some(action);
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: RedactedDebug) -> Self {
        self.debug = Some(debug);
        self
    }

    #[must_use]
    pub fn reason(&self) -> FailureReason {
        self.reason
    }

    /// Error-page URL with the reason and allow-listed context encoded.
    #[must_use]
    pub fn redirect_url(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("reason", self.reason.as_str());
        if self.recoverable {
            query.append_pair("recoverable", "true");
        }
        if let Some(action) = self.action {
            query.append_pair("action", action);
        }
        if let Some(debug) = &self.debug {
            if let Some(host) = &debug.host {
                query.append_pair("host", host);
            }
            if let Some(strategy) = &debug.strategy {
                query.append_pair("strategy", strategy);
            }
            query.append_pair("code_present", bool_str(debug.code_present));
            query.append_pair("state_present", bool_str(debug.state_present));
        }
        format!("{ERROR_PAGE}?{}", query.finish())
    }
}

const fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Query parameters consumed by the callback endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CsrfTokenResponse {
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
}

/// Machine-readable body for CSRF rejections.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CsrfErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(FailureReason::AuthFailed.as_str(), "auth_failed");
        assert_eq!(FailureReason::NoUser.as_str(), "no_user");
        assert_eq!(FailureReason::SessionFailed.as_str(), "session_failed");
        assert_eq!(FailureReason::StateMismatch.as_str(), "state_mismatch");
        assert_eq!(FailureReason::SessionCorrupt.as_str(), "session_corrupt");
    }

    #[test]
    fn plain_failure_redirect() {
        let url = LoginFailure::new(FailureReason::AuthFailed).redirect_url();
        assert_eq!(url, "/login-error?reason=auth_failed");
    }

    #[test]
    fn recoverable_mismatch_redirect() {
        let url = LoginFailure::new(FailureReason::StateMismatch)
            .recoverable()
            .redirect_url();
        assert_eq!(url, "/login-error?reason=state_mismatch&recoverable=true");
    }

    #[test]
    fn corrupt_session_redirect_carries_action() {
        let url = LoginFailure::new(FailureReason::SessionCorrupt)
            .with_action("restart")
            .redirect_url();
        assert_eq!(url, "/login-error?reason=session_corrupt&action=restart");
    }

    #[test]
    fn debug_payload_is_presence_flags_only() {
        let url = LoginFailure::new(FailureReason::NoUser)
            .with_debug(RedactedDebug {
                host: Some("shop.example".to_string()),
                strategy: Some("oidc:shop.example".to_string()),
                code_present: true,
                state_present: false,
            })
            .redirect_url();
        assert!(url.contains("reason=no_user"));
        assert!(url.contains("host=shop.example"));
        assert!(url.contains("code_present=true"));
        assert!(url.contains("state_present=false"));
    }

    #[test]
    fn csrf_token_response_uses_camel_case_key() -> anyhow::Result<()> {
        let response = CsrfTokenResponse {
            csrf_token: "token".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("csrfToken").is_some());
        Ok(())
    }
}
