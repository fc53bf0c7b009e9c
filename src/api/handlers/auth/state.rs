//! Auth configuration and the shared state handed to handlers.

use secrecy::{ExposeSecret, SecretString};

use super::tokens::{TokenAction, TokenError, TokenService};
use uuid::Uuid;

const DEFAULT_ISSUER: &str = "carelink";
const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_EMAIL_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_INVITE_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    issuer: String,
    frontend_base_url: String,
    session_ttl_seconds: i64,
    email_token_ttl_seconds: i64,
    invite_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_secret: SecretString, frontend_base_url: String) -> Self {
        Self {
            token_secret,
            issuer: DEFAULT_ISSUER.to_string(),
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            email_token_ttl_seconds: DEFAULT_EMAIL_TOKEN_TTL_SECONDS,
            invite_ttl_seconds: DEFAULT_INVITE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_email_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.email_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_invite_ttl_seconds(mut self, seconds: i64) -> Self {
        self.invite_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn email_token_ttl_seconds(&self) -> i64 {
        self.email_token_ttl_seconds
    }

    #[must_use]
    pub fn invite_ttl_seconds(&self) -> i64 {
        self.invite_ttl_seconds
    }

    /// Cookies are only marked `Secure` when the frontend is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Immutable auth state shared across requests.
#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    tokens: TokenService,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let tokens = TokenService::new(
            config.token_secret.expose_secret().as_bytes(),
            config.issuer.clone(),
        );
        Self { config, tokens }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub(crate) fn issue_session(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.tokens.issue(
            user_id,
            TokenAction::Session,
            None,
            self.config.session_ttl_seconds,
        )
    }

    pub(crate) fn issue_email_verification(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.tokens.issue(
            user_id,
            TokenAction::VerifyEmail,
            None,
            self.config.email_token_ttl_seconds,
        )
    }

    pub(crate) fn issue_carer_invite(
        &self,
        carer_id: Uuid,
        patient_id: Uuid,
    ) -> Result<String, TokenError> {
        self.tokens.issue(
            carer_id,
            TokenAction::AddCarer,
            Some(patient_id),
            self.config.invite_ttl_seconds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(frontend: &str) -> AuthConfig {
        AuthConfig::new(
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            frontend.to_string(),
        )
    }

    #[test]
    fn defaults_and_overrides() {
        let config = config("http://localhost:3000");
        assert_eq!(config.issuer(), "carelink");
        assert_eq!(config.session_ttl_seconds(), 604_800);
        assert_eq!(config.email_token_ttl_seconds(), 86_400);
        assert_eq!(config.invite_ttl_seconds(), 2_592_000);
        assert!(!config.session_cookie_secure());

        let config = config
            .with_issuer("carelink-staging".to_string())
            .with_session_ttl_seconds(60)
            .with_invite_ttl_seconds(120);
        assert_eq!(config.issuer(), "carelink-staging");
        assert_eq!(config.session_ttl_seconds(), 60);
        assert_eq!(config.invite_ttl_seconds(), 120);
    }

    #[test]
    fn https_frontend_marks_cookie_secure() {
        assert!(config("https://app.carelink.dev").session_cookie_secure());
    }

    #[test]
    fn issued_tokens_use_configured_ttls() -> Result<(), TokenError> {
        let state = AuthState::new(
            config("http://localhost:3000")
                .with_session_ttl_seconds(100)
                .with_email_token_ttl_seconds(200)
                .with_invite_ttl_seconds(300),
        );
        let user = Uuid::new_v4();
        let patient = Uuid::new_v4();

        let session = state.issue_session(user)?;
        let claims = state.tokens().verify(&session, TokenAction::Session)?;
        assert_eq!(claims.exp - claims.iat, 100);

        let verify = state.issue_email_verification(user)?;
        let claims = state.tokens().verify(&verify, TokenAction::VerifyEmail)?;
        assert_eq!(claims.exp - claims.iat, 200);

        let invite = state.issue_carer_invite(user, patient)?;
        let claims = state.tokens().verify(&invite, TokenAction::AddCarer)?;
        assert_eq!(claims.exp - claims.iat, 300);
        assert_eq!(claims.patient, Some(patient));
        Ok(())
    }
}
