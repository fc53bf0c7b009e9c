//! Signed tokens for sessions, email verification, and carer invitations.
//!
//! All three are HS256 JWTs sharing the server secret. The `act` claim pins a
//! token to one purpose, so verification always names the action it expects
//! and rejects anything else.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenAction {
    Session,
    VerifyEmail,
    AddCarer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub act: TokenAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token issued for another action")]
    WrongAction,
    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &[u8], issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer,
        }
    }

    /// Sign a token for `subject` valid for `ttl_seconds` from now.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn issue(
        &self,
        subject: Uuid,
        action: TokenAction,
        patient: Option<Uuid>,
        ttl_seconds: i64,
    ) -> Result<String, TokenError> {
        self.issue_at(subject, action, patient, Utc::now().timestamp(), ttl_seconds)
    }

    fn issue_at(
        &self,
        subject: Uuid,
        action: TokenAction,
        patient: Option<Uuid>,
        issued_at: i64,
        ttl_seconds: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject,
            act: action,
            patient,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_seconds),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Check signature, issuer, and expiry, then require the expected action.
    ///
    /// # Errors
    /// Returns [`TokenError::Expired`], [`TokenError::WrongAction`], or
    /// [`TokenError::Invalid`] for anything else that fails validation.
    pub fn verify(&self, token: &str, expected: TokenAction) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(err),
            })?;

        if claims.act != expected {
            return Err(TokenError::WrongAction);
        }
        if expected == TokenAction::AddCarer && claims.patient.is_none() {
            return Err(TokenError::WrongAction);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn service() -> TokenService {
        TokenService::new(SECRET, "carelink".to_string())
    }

    #[test]
    fn session_token_verifies() -> Result<(), TokenError> {
        let user_id = Uuid::new_v4();
        let token = service().issue(user_id, TokenAction::Session, None, 60)?;
        let claims = service().verify(&token, TokenAction::Session)?;
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "carelink");
        assert_eq!(claims.exp - claims.iat, 60);
        assert!(claims.patient.is_none());
        Ok(())
    }

    #[test]
    fn invite_token_carries_patient() -> Result<(), TokenError> {
        let carer = Uuid::new_v4();
        let patient = Uuid::new_v4();
        let token = service().issue(carer, TokenAction::AddCarer, Some(patient), 60)?;
        let claims = service().verify(&token, TokenAction::AddCarer)?;
        assert_eq!(claims.sub, carer);
        assert_eq!(claims.patient, Some(patient));
        Ok(())
    }

    #[test]
    fn action_is_never_interchangeable() -> Result<(), TokenError> {
        let user_id = Uuid::new_v4();
        let verify = service().issue(user_id, TokenAction::VerifyEmail, None, 60)?;
        assert!(matches!(
            service().verify(&verify, TokenAction::Session),
            Err(TokenError::WrongAction)
        ));

        let invite = service().issue(user_id, TokenAction::AddCarer, Some(Uuid::new_v4()), 60)?;
        assert!(matches!(
            service().verify(&invite, TokenAction::Session),
            Err(TokenError::WrongAction)
        ));
        assert!(matches!(
            service().verify(&invite, TokenAction::VerifyEmail),
            Err(TokenError::WrongAction)
        ));
        Ok(())
    }

    #[test]
    fn invite_without_patient_is_rejected() -> Result<(), TokenError> {
        let token = service().issue(Uuid::new_v4(), TokenAction::AddCarer, None, 60)?;
        assert!(matches!(
            service().verify(&token, TokenAction::AddCarer),
            Err(TokenError::WrongAction)
        ));
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<(), TokenError> {
        let issued_at = Utc::now().timestamp() - 7200;
        let token =
            service().issue_at(Uuid::new_v4(), TokenAction::Session, None, issued_at, 3600)?;
        assert!(matches!(
            service().verify(&token, TokenAction::Session),
            Err(TokenError::Expired)
        ));
        Ok(())
    }

    #[test]
    fn foreign_secret_or_issuer_is_rejected() -> Result<(), TokenError> {
        let other_secret =
            TokenService::new(b"ffffffffffffffffffffffffffffffff", "carelink".to_string());
        let other_issuer = TokenService::new(SECRET, "someone-else".to_string());
        let user_id = Uuid::new_v4();

        let token = other_secret.issue(user_id, TokenAction::Session, None, 60)?;
        assert!(matches!(
            service().verify(&token, TokenAction::Session),
            Err(TokenError::Invalid(_))
        ));

        let token = other_issuer.issue(user_id, TokenAction::Session, None, 60)?;
        assert!(matches!(
            service().verify(&token, TokenAction::Session),
            Err(TokenError::Invalid(_))
        ));
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            service().verify("not-a-token", TokenAction::Session),
            Err(TokenError::Invalid(_))
        ));
    }
}
