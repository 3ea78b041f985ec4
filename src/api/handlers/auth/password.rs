//! Argon2id password hashing for the credential store.

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use rand_core::OsRng;

/// Hash a password into a PHC string for storage.
///
/// # Errors
///
/// Returns an error if salt generation or hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Verify a password against a stored PHC string.
///
/// Unparseable hashes verify as false rather than erroring, so a corrupt
/// row degrades to a failed login instead of a 500.
#[must_use]
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() -> Result<()> {
        let hash = hash_password("S3curePass")?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "S3curePass"));
        assert!(!verify_password(&hash, "S3curePast"));
        Ok(())
    }

    #[test]
    fn distinct_salts_produce_distinct_hashes() -> Result<()> {
        let first = hash_password("S3curePass")?;
        let second = hash_password("S3curePass")?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "anything"));
        assert!(!verify_password("", "anything"));
    }
}
