use crate::api;
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub token_issuer: String,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub email_token_ttl_seconds: i64,
    pub invite_ttl_seconds: i64,
    pub email_outbox_poll_seconds: u64,
    pub email_outbox_batch_size: usize,
    pub email_outbox_max_attempts: u32,
    pub email_outbox_backoff_base_seconds: u64,
    pub email_outbox_backoff_max_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(args.token_secret, args.frontend_base_url)
        .with_issuer(args.token_issuer)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_email_token_ttl_seconds(args.email_token_ttl_seconds)
        .with_invite_ttl_seconds(args.invite_ttl_seconds);

    let email_config = api::email::EmailWorkerConfig {
        poll_interval: Duration::from_secs(args.email_outbox_poll_seconds),
        batch_size: args.email_outbox_batch_size,
        max_attempts: args.email_outbox_max_attempts,
        backoff_base: Duration::from_secs(args.email_outbox_backoff_base_seconds),
        backoff_max: Duration::from_secs(args.email_outbox_backoff_max_seconds),
    };

    api::new(args.port, args.dsn, auth_config, email_config).await
}
