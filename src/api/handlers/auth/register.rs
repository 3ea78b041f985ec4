//! Account registration.

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;

use super::password::hash_password;
use super::principal::Role;
use super::state::AuthState;
use super::storage::{NewAccount, SignupOutcome, insert_account};
use super::types::{AuthResponse, RegisterRequest};
use crate::api::error::{ApiError, ErrorBody, FieldError};
use crate::api::handlers::{
    normalize_email, normalize_optional, valid_email, valid_graduation_year, valid_linkedin_url,
    valid_password, valid_phone,
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created.", body = AuthResponse),
        (status = 400, description = "Validation failed.", body = ErrorBody),
        (status = 409, description = "Email already registered.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = validate_register(payload)?;
    let outcome = insert_account(&pool, account).await?;

    let record = match outcome {
        SignupOutcome::Created(record) => record,
        SignupOutcome::EmailTaken => {
            return Err(ApiError::Conflict("User already exists with this email"));
        }
    };

    let token = auth_state
        .mint_token(record.id)
        .map_err(|err| ApiError::Internal(anyhow::Error::new(err).context("minting token")))?;

    let response = AuthResponse {
        success: true,
        message: "User registered successfully".to_string(),
        token,
        user: record.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Validate and normalize the payload into storable account fields.
fn validate_register(payload: RegisterRequest) -> Result<NewAccount, ApiError> {
    let mut errors = Vec::new();

    let first_name = payload.first_name.trim().to_string();
    if first_name.len() < 2 || first_name.len() > 50 {
        errors.push(FieldError::new(
            "firstName",
            "First name must be between 2 and 50 characters",
        ));
    }

    let last_name = payload.last_name.trim().to_string();
    if last_name.len() < 2 || last_name.len() > 50 {
        errors.push(FieldError::new(
            "lastName",
            "Last name must be between 2 and 50 characters",
        ));
    }

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        errors.push(FieldError::new("email", "Please provide a valid email"));
    }

    if !valid_password(&payload.password) {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters and contain an uppercase letter, a lowercase letter, and a number",
        ));
    }

    let phone = normalize_optional(payload.phone);
    if let Some(phone) = &phone {
        if !valid_phone(phone) {
            errors.push(FieldError::new(
                "phone",
                "Please provide a valid phone number",
            ));
        }
    }

    if let Some(year) = payload.graduation_year {
        if !valid_graduation_year(year) {
            errors.push(FieldError::new(
                "graduationYear",
                "Please provide a valid graduation year",
            ));
        }
    }

    let department = normalize_optional(payload.department);
    if department.as_deref().is_some_and(|d| d.len() > 100) {
        errors.push(FieldError::new(
            "department",
            "Department name cannot be more than 100 characters",
        ));
    }

    let bio = normalize_optional(payload.bio);
    if bio.as_deref().is_some_and(|b| b.len() > 500) {
        errors.push(FieldError::new(
            "bio",
            "Bio cannot be more than 500 characters",
        ));
    }

    let linkedin_profile = normalize_optional(payload.linkedin_profile);
    if let Some(url) = &linkedin_profile {
        if !valid_linkedin_url(url) {
            errors.push(FieldError::new(
                "linkedinProfile",
                "Please provide a valid LinkedIn profile URL",
            ));
        }
    }

    let mentorship_areas: Vec<String> = payload
        .mentorship_areas
        .unwrap_or_default()
        .into_iter()
        .map(|area| area.trim().to_string())
        .collect();
    if mentorship_areas
        .iter()
        .any(|area| area.is_empty() || area.len() > 100)
    {
        errors.push(FieldError::new(
            "mentorshipAreas",
            "Each mentorship area must be between 1 and 100 characters",
        ));
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    // Hash only once the payload is known-good; hashing is the costly step.
    let password_hash = hash_password(&payload.password)?;

    let (job_title, job_company, job_location) = match payload.current_job {
        Some(job) => (
            normalize_optional(job.title),
            normalize_optional(job.company),
            normalize_optional(job.location),
        ),
        None => (None, None, None),
    };

    Ok(NewAccount {
        email,
        password_hash,
        first_name,
        last_name,
        role: payload.role.unwrap_or(Role::Alumni),
        phone,
        graduation_year: payload.graduation_year,
        department,
        job_title,
        job_company,
        job_location,
        bio,
        linkedin_profile,
        is_mentor: payload.is_mentor.unwrap_or(false),
        mentorship_areas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> RegisterRequest {
        serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "Ada@Example.com",
            "password": "Analytic1"
        }))
        .expect("valid request json")
    }

    #[test]
    fn valid_payload_normalizes_and_hashes() -> Result<(), ApiError> {
        let account = validate_register(base_request())?;
        assert_eq!(account.email, "ada@example.com");
        assert_eq!(account.role, Role::Alumni);
        assert!(account.password_hash.starts_with("$argon2"));
        assert!(!account.is_mentor);
        Ok(())
    }

    #[test]
    fn short_name_is_rejected() {
        let mut request = base_request();
        request.first_name = "A".to_string();
        let result = validate_register(request);
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn weak_password_is_rejected() {
        let mut request = base_request();
        request.password = "weakpass".to_string();
        assert!(matches!(
            validate_register(request),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn multiple_failures_collected_per_field() {
        let mut request = base_request();
        request.email = "nope".to_string();
        request.password = "short".to_string();
        match validate_register(request) {
            Err(ApiError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"email"));
                assert!(fields.contains(&"password"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn bad_linkedin_url_is_rejected() {
        let mut request = base_request();
        request.linkedin_profile = Some("https://example.com/in/ada".to_string());
        assert!(matches!(
            validate_register(request),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn empty_mentorship_area_is_rejected() {
        let mut request = base_request();
        request.mentorship_areas = Some(vec!["  ".to_string()]);
        assert!(matches!(
            validate_register(request),
            Err(ApiError::Validation(_))
        ));
    }
}
