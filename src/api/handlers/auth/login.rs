//! Login endpoint.
//!
//! Flow Overview:
//! 1) Normalize the email and look up stored credentials.
//! 2) Reject unknown accounts and bad passwords with the same 401.
//! 3) Deactivated accounts cannot log in regardless of password.
//! 4) Mint a signed identity token and return the sanitized account.

use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use sqlx::PgPool;

use super::password::verify_password;
use super::state::AuthState;
use super::storage::{fetch_account, lookup_credentials};
use super::types::{AuthResponse, LoginRequest};
use crate::api::error::{ApiError, ErrorBody};
use crate::api::handlers::normalize_email;

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful.", body = AuthResponse),
        (status = 400, description = "Validation failed.", body = ErrorBody),
        (status = 401, description = "Invalid credentials or deactivated account.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);
    if email.is_empty() {
        return Err(ApiError::invalid("email", "Please provide a valid email"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::invalid("password", "Password is required"));
    }

    let Some(credentials) = lookup_credentials(&pool, &email).await? else {
        return Err(ApiError::Unauthenticated("Invalid credentials"));
    };

    if !credentials.is_active {
        return Err(ApiError::Unauthenticated("Account has been deactivated"));
    }

    if !verify_password(&credentials.password_hash, &payload.password) {
        return Err(ApiError::Unauthenticated("Invalid credentials"));
    }

    let record = fetch_account(&pool, credentials.id)
        .await?
        .ok_or(ApiError::Unauthenticated("Invalid credentials"))?;

    let token = auth_state
        .mint_token(record.id)
        .map_err(|err| ApiError::Internal(anyhow::Error::new(err).context("minting token")))?;

    let response = AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        token,
        user: record.into(),
    };
    Ok(Json(response))
}
