use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_OIDC_CLIENT_ID: &str = "oidc-client-id";
pub const ARG_OIDC_CLIENT_SECRET: &str = "oidc-client-secret";
pub const ARG_OIDC_AUTH_URL: &str = "oidc-auth-url";
pub const ARG_OIDC_TOKEN_URL: &str = "oidc-token-url";
pub const ARG_OIDC_USERINFO_URL: &str = "oidc-userinfo-url";
pub const ARG_OIDC_REDIRECT_URL: &str = "oidc-redirect-url";

#[derive(Debug, Clone)]
pub struct Options {
    pub client_id: String,
    pub client_secret: SecretString,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_url: String,
}

impl Options {
    /// Parse OIDC provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            client_id: get_non_empty(ARG_OIDC_CLIENT_ID)?,
            client_secret: SecretString::from(get_non_empty(ARG_OIDC_CLIENT_SECRET)?),
            auth_url: get_non_empty(ARG_OIDC_AUTH_URL)?,
            token_url: get_non_empty(ARG_OIDC_TOKEN_URL)?,
            userinfo_url: get_non_empty(ARG_OIDC_USERINFO_URL)?,
            redirect_url: get_non_empty(ARG_OIDC_REDIRECT_URL)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OIDC_CLIENT_ID)
                .long(ARG_OIDC_CLIENT_ID)
                .help("OAuth client id issued by the identity provider")
                .env("VETRINA_OIDC_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_OIDC_CLIENT_SECRET)
                .long(ARG_OIDC_CLIENT_SECRET)
                .help("OAuth client secret issued by the identity provider")
                .env("VETRINA_OIDC_CLIENT_SECRET"),
        )
        .arg(
            Arg::new(ARG_OIDC_AUTH_URL)
                .long(ARG_OIDC_AUTH_URL)
                .help("Provider authorization endpoint")
                .env("VETRINA_OIDC_AUTH_URL")
                .default_value("https://accounts.google.com/o/oauth2/v2/auth"),
        )
        .arg(
            Arg::new(ARG_OIDC_TOKEN_URL)
                .long(ARG_OIDC_TOKEN_URL)
                .help("Provider token endpoint")
                .env("VETRINA_OIDC_TOKEN_URL")
                .default_value("https://oauth2.googleapis.com/token"),
        )
        .arg(
            Arg::new(ARG_OIDC_USERINFO_URL)
                .long(ARG_OIDC_USERINFO_URL)
                .help("Provider userinfo endpoint")
                .env("VETRINA_OIDC_USERINFO_URL")
                .default_value("https://openidconnect.googleapis.com/v1/userinfo"),
        )
        .arg(
            Arg::new(ARG_OIDC_REDIRECT_URL)
                .long(ARG_OIDC_REDIRECT_URL)
                .help("Callback URL registered with the provider")
                .env("VETRINA_OIDC_REDIRECT_URL")
                .default_value("https://vetrina.shop/api/callback"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn parse_requires_client_credentials() {
        let command = with_args(Command::new("vetrina"));
        let matches = command.get_matches_from(vec!["vetrina"]);
        let result = Options::parse(&matches);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(
                err.to_string()
                    .contains("missing required argument: --oidc-client-id")
            );
        }
    }

    #[test]
    fn parse_with_credentials() -> anyhow::Result<()> {
        let command = with_args(Command::new("vetrina"));
        let matches = command.get_matches_from(vec![
            "vetrina",
            "--oidc-client-id",
            "client",
            "--oidc-client-secret",
            "secret",
        ]);
        let options = Options::parse(&matches)?;
        assert_eq!(options.client_id, "client");
        assert_eq!(options.client_secret.expose_secret(), "secret");
        assert_eq!(
            options.redirect_url,
            "https://vetrina.shop/api/callback"
        );
        Ok(())
    }
}
