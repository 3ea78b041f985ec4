//! Signed identity tokens.
//!
//! Tokens are RS256 JWTs minted at login/registration and verified by the
//! authorization guard on every protected request. A single RSA keypair is
//! loaded at startup; the private half signs, the derived public half
//! verifies.

use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey, errors::Error as RsaError};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub const TOKEN_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityTokenHeader {
    pub alg: String,
    pub typ: String,
}

impl IdentityTokenHeader {
    fn rs256() -> Self {
        Self {
            alg: "RS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims embedded in an identity token. `sub` is the account id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityTokenClaims {
    pub v: u8,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl IdentityTokenClaims {
    #[must_use]
    pub fn new(issuer: &str, subject: &str, now_unix_seconds: i64, ttl_seconds: i64) -> Self {
        Self {
            v: TOKEN_VERSION,
            iss: issuer.to_string(),
            sub: subject.to_string(),
            iat: now_unix_seconds,
            exp: now_unix_seconds.saturating_add(ttl_seconds),
            jti: ulid::Ulid::new().to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("failed to parse RSA key")]
    KeyParse,
    #[error("rsa error")]
    Rsa(#[from] RsaError),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid token version")]
    InvalidVersion,
}

/// Signing and verifying halves of the identity keypair.
pub struct TokenKeys {
    signing_key: SigningKey<Sha256>,
    verifying_key: VerifyingKey<Sha256>,
}

impl TokenKeys {
    /// Load the keypair from a PKCS#8 or PKCS#1 private key, PEM or DER.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyParse`] if the key material cannot be decoded.
    pub fn from_private_key(pem_or_der: &[u8]) -> Result<Self, Error> {
        let private_key = decode_private_key(pem_or_der)?;
        Ok(Self::from_rsa_private_key(private_key))
    }

    #[must_use]
    pub fn from_rsa_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = RsaPublicKey::from(&private_key);
        Self {
            signing_key: SigningKey::new(private_key),
            verifying_key: VerifyingKey::new(public_key),
        }
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn decode_private_key(pem_or_der: &[u8]) -> Result<RsaPrivateKey, Error> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let s = std::str::from_utf8(pem_or_der).map_err(|_| Error::KeyParse)?;
        if let Ok(k) = RsaPrivateKey::from_pkcs8_pem(s) {
            return Ok(k);
        }
        if let Ok(k) = RsaPrivateKey::from_pkcs1_pem(s) {
            return Ok(k);
        }
        return Err(Error::KeyParse);
    }

    if let Ok(k) = RsaPrivateKey::from_pkcs8_der(pem_or_der) {
        return Ok(k);
    }
    if let Ok(k) = RsaPrivateKey::from_pkcs1_der(pem_or_der) {
        return Ok(k);
    }
    Err(Error::KeyParse)
}

/// Create an RS256-signed identity token.
///
/// # Errors
///
/// Returns an error if the header or claims cannot be encoded as JSON.
pub fn sign_rs256(keys: &TokenKeys, claims: &IdentityTokenClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&IdentityTokenHeader::rs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature: Signature = keys.signing_key.sign(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an RS256 identity token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the signature is invalid,
/// - the claims fail validation (`v`, `iss`, `exp`).
pub fn verify_rs256(
    token: &str,
    keys: &TokenKeys,
    expected_issuer: &str,
    now_unix_seconds: i64,
) -> Result<IdentityTokenClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: IdentityTokenHeader = b64d_json(header_b64)?;
    if header.alg != "RS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;

    let signing_input = format!("{header_b64}.{claims_b64}");
    keys.verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: IdentityTokenClaims = b64d_json(claims_b64)?;
    if claims.v != TOKEN_VERSION {
        return Err(Error::InvalidVersion);
    }
    if claims.iss != expected_issuer {
        return Err(Error::InvalidIssuer);
    }
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "alumnet";

    fn test_keys() -> TokenKeys {
        let private_key =
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate RSA key");
        TokenKeys::from_rsa_private_key(private_key)
    }

    fn claims_at(now: i64) -> IdentityTokenClaims {
        IdentityTokenClaims::new(ISSUER, "8d3ce1f4-0000-0000-0000-000000000001", now, 3600)
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<(), Error> {
        let keys = test_keys();
        let claims = claims_at(1_700_000_000);
        let token = sign_rs256(&keys, &claims)?;

        let verified = verify_rs256(&token, &keys, ISSUER, 1_700_000_100)?;
        assert_eq!(verified, claims);
        Ok(())
    }

    #[test]
    fn verify_rejects_expired_token() -> Result<(), Error> {
        let keys = test_keys();
        let claims = claims_at(1_700_000_000);
        let token = sign_rs256(&keys, &claims)?;

        let result = verify_rs256(&token, &keys, ISSUER, claims.exp);
        assert!(matches!(result, Err(Error::Expired)));
        Ok(())
    }

    #[test]
    fn verify_rejects_wrong_issuer() -> Result<(), Error> {
        let keys = test_keys();
        let token = sign_rs256(&keys, &claims_at(1_700_000_000))?;

        let result = verify_rs256(&token, &keys, "someone-else", 1_700_000_100);
        assert!(matches!(result, Err(Error::InvalidIssuer)));
        Ok(())
    }

    #[test]
    fn verify_rejects_tampered_claims() -> Result<(), Error> {
        let keys = test_keys();
        let token = sign_rs256(&keys, &claims_at(1_700_000_000))?;

        let mut forged = claims_at(1_700_000_000);
        forged.sub = "8d3ce1f4-0000-0000-0000-00000000beef".to_string();
        let forged_b64 = b64e_json(&forged)?;

        let mut parts = token.split('.');
        let header = parts.next().ok_or(Error::TokenFormat)?;
        let sig = parts.nth(1).ok_or(Error::TokenFormat)?;
        let tampered = format!("{header}.{forged_b64}.{sig}");

        let result = verify_rs256(&tampered, &keys, ISSUER, 1_700_000_100);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn verify_rejects_foreign_key() -> Result<(), Error> {
        let keys = test_keys();
        let other_keys = test_keys();
        let token = sign_rs256(&keys, &claims_at(1_700_000_000))?;

        let result = verify_rs256(&token, &other_keys, ISSUER, 1_700_000_100);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn verify_rejects_malformed_tokens() {
        let keys = test_keys();
        for token in ["", "a.b", "a.b.c.d", "!!.??.##"] {
            assert!(verify_rs256(token, &keys, ISSUER, 0).is_err(), "{token}");
        }
    }

    #[test]
    fn claims_carry_version_and_ttl() {
        let claims = claims_at(100);
        assert_eq!(claims.v, TOKEN_VERSION);
        assert_eq!(claims.iat, 100);
        assert_eq!(claims.exp, 3700);
        assert!(!claims.jti.is_empty());
    }
}
