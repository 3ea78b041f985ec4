//! Authorization guard: identity resolution and role checks.
//!
//! Flow Overview: extract the bearer token, verify signature and expiry,
//! resolve the subject to an account, and attach a [`Principal`] extension
//! for downstream handlers. The guard never mutates persisted state.
//! Ownership checks (organizer-or-admin, party-of-request) belong to the
//! services, using the attached principal.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::state::AuthState;
use super::storage::lookup_principal;
use crate::api::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Alumni,
    Student,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Alumni => "alumni",
            Self::Student => "student",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "alumni" => Ok(Self::Alumni),
            "student" => Ok(Self::Student),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated account context derived from the bearer token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Middleware protecting every non-public route.
///
/// Missing header, bad signature, expiry, unknown subject, and deactivated
/// accounts all collapse into the same 401 so callers cannot probe account
/// state.
///
/// # Errors
///
/// `Unauthenticated` as described above; `Internal` if the account lookup
/// fails.
pub async fn authenticate(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or(ApiError::Unauthenticated("Not authorized to access this route"))?;

    let auth_state = request
        .extensions()
        .get::<Arc<AuthState>>()
        .cloned()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("auth state missing from request")))?;
    let pool = request
        .extensions()
        .get::<PgPool>()
        .cloned()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("database pool missing from request")))?;

    let claims = auth_state.verify_token(&token).map_err(|err| {
        debug!("Token verification failed: {err}");
        ApiError::Unauthenticated("Not authorized to access this route")
    })?;

    let account_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthenticated("Not authorized to access this route"))?;

    let record = lookup_principal(&pool, account_id)
        .await?
        .ok_or(ApiError::Unauthenticated("Not authorized to access this route"))?;

    // A valid, unexpired token is not enough once the account is deactivated.
    if !record.is_active {
        return Err(ApiError::Unauthenticated("Account has been deactivated"));
    }

    let role: Role = record
        .role
        .parse()
        .map_err(|()| ApiError::Internal(anyhow::anyhow!("unknown role in database: {}", record.role)))?;

    request.extensions_mut().insert(Principal {
        account_id: record.id,
        email: record.email,
        role,
    });

    Ok(next.run(request).await)
}

/// Role allow-list check, run after identity resolution.
///
/// # Errors
///
/// `Forbidden` when the principal's role is not in `allowed`.
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Your role is not authorized to access this route",
        ))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn principal(role: Role) -> Principal {
        Principal {
            account_id: Uuid::from_u128(7),
            email: "alice@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn extract_bearer_token_accepts_standard_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(
            extract_bearer_token(&headers),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn extract_bearer_token_accepts_lowercase_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn extract_bearer_token_rejects_missing_or_empty() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn authorize_allows_listed_roles() {
        assert!(authorize(&principal(Role::Admin), &[Role::Admin, Role::Alumni]).is_ok());
        assert!(authorize(&principal(Role::Alumni), &[Role::Admin, Role::Alumni]).is_ok());
    }

    #[test]
    fn authorize_rejects_unlisted_roles() {
        let result = authorize(&principal(Role::Student), &[Role::Admin]);
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Admin, Role::Alumni, Role::Student] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn admin_check() {
        assert!(principal(Role::Admin).is_admin());
        assert!(!principal(Role::Student).is_admin());
    }
}
