//! Authenticated self-service endpoints: current account, profile update,
//! password change. The guard has already attached the [`Principal`].

use axum::{Json, extract::Extension, response::IntoResponse};
use sqlx::PgPool;

use super::password::{hash_password, verify_password};
use super::principal::Principal;
use super::storage::{
    ProfileChanges, fetch_account, fetch_password_hash, update_password, update_profile,
};
use super::types::{
    AccountResponse, MessageResponse, PasswordChangeRequest, ProfileUpdateRequest,
};
use crate::api::error::{ApiError, ErrorBody, FieldError};
use crate::api::handlers::{
    normalize_optional, valid_graduation_year, valid_linkedin_url, valid_password, valid_phone,
};

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current account.", body = AccountResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn me(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let record = fetch_account(&pool, principal.account_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(AccountResponse {
        success: true,
        user: record.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated.", body = AccountResponse),
        (status = 400, description = "Validation failed.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn update_own_profile(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = validate_profile_update(payload)?;

    let record = update_profile(&pool, principal.account_id, changes)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(AccountResponse {
        success: true,
        user: record.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/auth/password",
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed.", body = MessageResponse),
        (status = 400, description = "Wrong current password or weak new password.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn change_password(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<PasswordChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !valid_password(&payload.new_password) {
        return Err(ApiError::invalid(
            "newPassword",
            "Password must be at least 6 characters and contain an uppercase letter, a lowercase letter, and a number",
        ));
    }

    let stored_hash = fetch_password_hash(&pool, principal.account_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    if !verify_password(&stored_hash, &payload.current_password) {
        return Err(ApiError::invalid(
            "currentPassword",
            "Current password is incorrect",
        ));
    }

    let new_hash = hash_password(&payload.new_password)?;
    if !update_password(&pool, principal.account_id, &new_hash).await? {
        return Err(ApiError::NotFound("User not found"));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "Password changed successfully".to_string(),
    }))
}

/// Validate optional fields and map them onto allow-listed changes.
pub(crate) fn validate_profile_update(
    payload: ProfileUpdateRequest,
) -> Result<ProfileChanges, ApiError> {
    let mut errors = Vec::new();

    let first_name = normalize_optional(payload.first_name);
    if first_name
        .as_deref()
        .is_some_and(|name| name.len() < 2 || name.len() > 50)
    {
        errors.push(FieldError::new(
            "firstName",
            "First name must be between 2 and 50 characters",
        ));
    }

    let last_name = normalize_optional(payload.last_name);
    if last_name
        .as_deref()
        .is_some_and(|name| name.len() < 2 || name.len() > 50)
    {
        errors.push(FieldError::new(
            "lastName",
            "Last name must be between 2 and 50 characters",
        ));
    }

    let phone = normalize_optional(payload.phone);
    if phone.as_deref().is_some_and(|p| !valid_phone(p)) {
        errors.push(FieldError::new(
            "phone",
            "Please provide a valid phone number",
        ));
    }

    if payload
        .graduation_year
        .is_some_and(|year| !valid_graduation_year(year))
    {
        errors.push(FieldError::new(
            "graduationYear",
            "Please provide a valid graduation year",
        ));
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
    if linkedin_profile
        .as_deref()
        .is_some_and(|url| !valid_linkedin_url(url))
    {
        errors.push(FieldError::new(
            "linkedinProfile",
            "Please provide a valid LinkedIn profile URL",
        ));
    }

    let mentorship_areas = payload.mentorship_areas.map(|areas| {
        areas
            .into_iter()
            .map(|area| area.trim().to_string())
            .collect::<Vec<_>>()
    });
    if mentorship_areas
        .as_deref()
        .is_some_and(|areas| areas.iter().any(|a| a.is_empty() || a.len() > 100))
    {
        errors.push(FieldError::new(
            "mentorshipAreas",
            "Each mentorship area must be between 1 and 100 characters",
        ));
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let (job_title, job_company, job_location) = match payload.current_job {
        Some(job) => (
            normalize_optional(job.title),
            normalize_optional(job.company),
            normalize_optional(job.location),
        ),
        None => (None, None, None),
    };

    let changes = ProfileChanges {
        first_name,
        last_name,
        phone,
        graduation_year: payload.graduation_year,
        department,
        job_title,
        job_company,
        job_location,
        bio,
        linkedin_profile,
        is_mentor: payload.is_mentor,
        mentorship_areas,
        profile_picture: payload.profile_picture,
    };

    if profile_changes_empty(&changes) {
        return Err(ApiError::invalid("body", "No updates provided"));
    }

    Ok(changes)
}

fn profile_changes_empty(changes: &ProfileChanges) -> bool {
    changes.first_name.is_none()
        && changes.last_name.is_none()
        && changes.phone.is_none()
        && changes.graduation_year.is_none()
        && changes.department.is_none()
        && changes.job_title.is_none()
        && changes.job_company.is_none()
        && changes.job_location.is_none()
        && changes.bio.is_none()
        && changes.linkedin_profile.is_none()
        && changes.is_mentor.is_none()
        && changes.mentorship_areas.is_none()
        && changes.profile_picture.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_is_rejected() {
        let result = validate_profile_update(ProfileUpdateRequest::default());
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn partial_update_passes_through() -> Result<(), ApiError> {
        let payload = ProfileUpdateRequest {
            department: Some(" Physics ".to_string()),
            is_mentor: Some(true),
            ..ProfileUpdateRequest::default()
        };
        let changes = validate_profile_update(payload)?;
        assert_eq!(changes.department.as_deref(), Some("Physics"));
        assert_eq!(changes.is_mentor, Some(true));
        assert!(changes.first_name.is_none());
        Ok(())
    }

    #[test]
    fn invalid_year_is_rejected() {
        let payload = ProfileUpdateRequest {
            graduation_year: Some(1900),
            ..ProfileUpdateRequest::default()
        };
        assert!(matches!(
            validate_profile_update(payload),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn blank_fields_do_not_count_as_updates() {
        let payload = ProfileUpdateRequest {
            department: Some("   ".to_string()),
            ..ProfileUpdateRequest::default()
        };
        // Blanks normalize away, leaving nothing to update.
        assert!(matches!(
            validate_profile_update(payload),
            Err(ApiError::Validation(_))
        ));
    }
}
