use anyhow::bail;
use clap::{Arg, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_ISSUER: &str = "token-issuer";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_EMAIL_TOKEN_TTL_SECONDS: &str = "email-token-ttl-seconds";
pub const ARG_INVITE_TTL_SECONDS: &str = "invite-ttl-seconds";

/// HS256 keys shorter than the hash output weaken the signature.
const MIN_TOKEN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Options {
    pub token_secret: SecretString,
    pub token_issuer: String,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub email_token_ttl_seconds: i64,
    pub invite_ttl_seconds: i64,
}

impl Options {
    /// Parse token and link arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the token secret is missing or too short, or a TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let token_secret = match matches.get_one::<String>(ARG_TOKEN_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => bail!("missing required argument: --{ARG_TOKEN_SECRET}"),
        };
        if token_secret.expose_secret().len() < MIN_TOKEN_SECRET_LEN {
            bail!("--{ARG_TOKEN_SECRET} must be at least {MIN_TOKEN_SECRET_LEN} bytes");
        }

        let ttl = |id: &str| -> anyhow::Result<i64> {
            let value = matches.get_one::<i64>(id).copied().unwrap_or(0);
            if value <= 0 {
                bail!("--{id} must be greater than zero");
            }
            Ok(value)
        };

        Ok(Self {
            token_secret,
            token_issuer: matches
                .get_one::<String>(ARG_TOKEN_ISSUER)
                .cloned()
                .unwrap_or_else(|| "carelink".to_string()),
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            session_ttl_seconds: ttl(ARG_SESSION_TTL_SECONDS)?,
            email_token_ttl_seconds: ttl(ARG_EMAIL_TOKEN_TTL_SECONDS)?,
            invite_ttl_seconds: ttl(ARG_INVITE_TTL_SECONDS)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("Secret used to sign session, verification and invitation tokens")
                .env("CARELINK_TOKEN_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_ISSUER)
                .long(ARG_TOKEN_ISSUER)
                .help("Issuer (iss) written to and expected in every token")
                .env("CARELINK_TOKEN_ISSUER")
                .default_value("carelink"),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for CORS and email links")
                .env("CARELINK_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token and cookie TTL in seconds")
                .env("CARELINK_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_EMAIL_TOKEN_TTL_SECONDS)
                .long(ARG_EMAIL_TOKEN_TTL_SECONDS)
                .help("Email verification token TTL in seconds")
                .env("CARELINK_EMAIL_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_INVITE_TTL_SECONDS)
                .long(ARG_INVITE_TTL_SECONDS)
                .help("Carer invitation token TTL in seconds")
                .env("CARELINK_INVITE_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
}
