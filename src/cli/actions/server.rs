use anyhow::{Context, Result, anyhow};
use secrecy::{ExposeSecret, SecretString};

use crate::api::{self, AuthConfig};
use crate::cli::actions::Action;
use crate::token::TokenKeys;

/// Handle the server action.
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            token_key_path,
            token_ttl,
            frontend_url,
        } => {
            let pem = SecretString::from(
                std::fs::read_to_string(&token_key_path)
                    .with_context(|| format!("Failed to read token key: {token_key_path}"))?,
            );
            let keys = TokenKeys::from_private_key(pem.expose_secret().as_bytes())
                .map_err(|err| anyhow!("Invalid token signing key: {err}"))?;

            let auth_config =
                AuthConfig::new(frontend_url).with_token_ttl_seconds(token_ttl);

            api::new(port, dsn, auth_config, keys).await?;
        }
    }

    Ok(())
}
