//! Maps parsed CLI arguments to the action the binary executes.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, outbox, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let outbox_opts = outbox::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: auth_opts.token_secret,
        token_issuer: auth_opts.token_issuer,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        email_token_ttl_seconds: auth_opts.email_token_ttl_seconds,
        invite_ttl_seconds: auth_opts.invite_ttl_seconds,
        email_outbox_poll_seconds: outbox_opts.poll_seconds,
        email_outbox_batch_size: outbox_opts.batch_size,
        email_outbox_max_attempts: outbox_opts.max_attempts,
        email_outbox_backoff_base_seconds: outbox_opts.backoff_base_seconds,
        email_outbox_backoff_max_seconds: outbox_opts.backoff_max_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "an-example-secret-of-at-least-32-bytes";

    #[test]
    fn token_secret_required() {
        temp_env::with_vars(
            [
                ("CARELINK_TOKEN_SECRET", None::<&str>),
                (
                    "CARELINK_DSN",
                    Some("postgres://user@localhost:5432/carelink"),
                ),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["carelink"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --token-secret"));
                }
            },
        );
    }

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("CARELINK_TOKEN_SECRET", Some(SECRET)),
                (
                    "CARELINK_DSN",
                    Some("postgres://user@localhost:5432/carelink"),
                ),
                ("CARELINK_PORT", Some("9000")),
                ("CARELINK_FRONTEND_BASE_URL", Some("https://app.carelink.dev")),
                ("CARELINK_SESSION_TTL_SECONDS", Some("3600")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["carelink"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 9000);
                    assert_eq!(args.dsn, "postgres://user@localhost:5432/carelink");
                    assert_eq!(args.frontend_base_url, "https://app.carelink.dev");
                    assert_eq!(args.session_ttl_seconds, 3600);
                    assert_eq!(args.token_issuer, "carelink");
                    assert_eq!(args.email_outbox_batch_size, 10);
                }
            },
        );
    }
}
