use clap::{Arg, ArgMatches, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_DEFAULT_HOST: &str = "default-host";
pub const ARG_STRATEGY_PREFIX: &str = "strategy-prefix";
pub const ARG_OAUTH_HOST: &str = "oauth-host";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_CSRF_TTL_SECONDS: &str = "csrf-ttl-seconds";
pub const ARG_SETTLE_DELAY_MS: &str = "persistence-settle-delay-ms";
pub const ARG_EXCHANGE_TIMEOUT_SECONDS: &str = "exchange-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub frontend_base_url: String,
    pub default_host: String,
    pub strategy_prefix: String,
    pub oauth_hosts: Vec<String>,
    pub session_ttl_seconds: i64,
    pub csrf_ttl_seconds: u64,
    pub persistence_settle_delay_ms: u64,
    pub exchange_timeout_seconds: u64,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_string = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let default_host = get_string(ARG_DEFAULT_HOST)?;
        let mut oauth_hosts: Vec<String> = matches
            .get_many::<String>(ARG_OAUTH_HOST)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        if !oauth_hosts.contains(&default_host) {
            oauth_hosts.push(default_host.clone());
        }

        Ok(Self {
            frontend_base_url: get_string(ARG_FRONTEND_BASE_URL)?,
            default_host,
            strategy_prefix: get_string(ARG_STRATEGY_PREFIX)?,
            oauth_hosts,
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(604_800),
            csrf_ttl_seconds: matches
                .get_one::<u64>(ARG_CSRF_TTL_SECONDS)
                .copied()
                .unwrap_or(900),
            persistence_settle_delay_ms: matches
                .get_one::<u64>(ARG_SETTLE_DELAY_MS)
                .copied()
                .unwrap_or(150),
            exchange_timeout_seconds: matches
                .get_one::<u64>(ARG_EXCHANGE_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(10),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for CORS and cookie policy")
                .env("VETRINA_FRONTEND_BASE_URL")
                .default_value("https://vetrina.shop"),
        )
        .arg(
            Arg::new(ARG_DEFAULT_HOST)
                .long(ARG_DEFAULT_HOST)
                .help("Fallback hostname when requests omit the Host header")
                .env("VETRINA_DEFAULT_HOST")
                .default_value("vetrina.shop"),
        )
        .arg(
            Arg::new(ARG_STRATEGY_PREFIX)
                .long(ARG_STRATEGY_PREFIX)
                .help("Prefix for host-derived OAuth strategy identifiers")
                .env("VETRINA_STRATEGY_PREFIX")
                .default_value("oidc"),
        )
        .arg(
            Arg::new(ARG_OAUTH_HOST)
                .long(ARG_OAUTH_HOST)
                .help("Hostname to register an OAuth strategy for (repeatable)")
                .long_help(
                    "Hostname to register an OAuth strategy for. Repeat for every domain the storefront serves; the default host is always registered.",
                )
                .env("VETRINA_OAUTH_HOSTS")
                .value_delimiter(',')
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("VETRINA_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_CSRF_TTL_SECONDS)
                .long(ARG_CSRF_TTL_SECONDS)
                .help("CSRF token TTL in seconds")
                .env("VETRINA_CSRF_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SETTLE_DELAY_MS)
                .long(ARG_SETTLE_DELAY_MS)
                .help("Delay before the post-login persistence check, in milliseconds")
                .env("VETRINA_PERSISTENCE_SETTLE_DELAY_MS")
                .default_value("150")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_EXCHANGE_TIMEOUT_SECONDS)
                .long(ARG_EXCHANGE_TIMEOUT_SECONDS)
                .help("Timeout for the provider token exchange in seconds")
                .env("VETRINA_EXCHANGE_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
}
