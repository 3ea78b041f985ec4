//! Auth configuration and shared state.

use std::time::SystemTime;

use crate::token::{self, IdentityTokenClaims, TokenKeys};

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_ISSUER: &str = "alumnet";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    issuer: String,
    token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            issuer: DEFAULT_ISSUER.to_string(),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }
}

/// Token service handed to handlers through a request extension.
#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    keys: TokenKeys,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, keys: TokenKeys) -> Self {
        Self { config, keys }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Issue a signed identity token for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if claim encoding or signing fails.
    pub fn mint_token(&self, account_id: uuid::Uuid) -> Result<String, token::Error> {
        let claims = IdentityTokenClaims::new(
            self.config.issuer(),
            &account_id.to_string(),
            now_unix_seconds(),
            self.config.token_ttl_seconds(),
        );
        token::sign_rs256(&self.keys, &claims)
    }

    /// Verify a presented token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed, forged, or expired tokens.
    pub fn verify_token(&self, presented: &str) -> Result<IdentityTokenClaims, token::Error> {
        token::verify_rs256(
            presented,
            &self.keys,
            self.config.issuer(),
            now_unix_seconds(),
        )
    }
}

/// Unix seconds for token TTL validation.
pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    fn test_state() -> AuthState {
        let private_key =
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate RSA key");
        AuthState::new(
            AuthConfig::new("http://localhost:3000".to_string()),
            TokenKeys::from_rsa_private_key(private_key),
        )
    }

    #[test]
    fn mint_then_verify() -> anyhow::Result<()> {
        let state = test_state();
        let account_id = uuid::Uuid::new_v4();
        let token = state.mint_token(account_id)?;
        let claims = state.verify_token(&token)?;
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.iss, "alumnet");
        Ok(())
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = AuthConfig::new("http://localhost:3000".to_string())
            .with_issuer("alumnet-test".to_string())
            .with_token_ttl_seconds(60);
        assert_eq!(config.issuer(), "alumnet-test");
        assert_eq!(config.token_ttl_seconds(), 60);
        assert_eq!(config.frontend_base_url(), "http://localhost:3000");
    }
}
