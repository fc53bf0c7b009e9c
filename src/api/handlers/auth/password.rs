//! Argon2id password hashing.

use anyhow::Result;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use tracing::warn;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password into a PHC string with a fresh random salt.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| anyhow::anyhow!("failed to hash password"))?
        .to_string();
    Ok(hash)
}

/// Compare a password with a stored PHC string. Unparseable hashes never match.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        warn!("stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_argon2id_and_salted() -> Result<()> {
        let first = hash_password("correct horse")?;
        let second = hash_password("correct horse")?;
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password("correct horse", &first));
        assert!(!verify_password("battery staple", &first));
        Ok(())
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_password("anything", "plaintext"));
        assert!(!verify_password("", ""));
    }
}
