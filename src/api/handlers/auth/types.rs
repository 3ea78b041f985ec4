//! Request/response types for auth endpoints.
//!
//! Wire names are camelCase to match the public API contract.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::principal::Role;
use super::storage::AccountRecord;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl CurrentJob {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.company.is_none() && self.location.is_none()
    }
}

/// Sanitized account representation. The password hash never appears here.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountBody {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_job: Option<CurrentJob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_profile: Option<String>,
    pub is_mentor: bool,
    pub mentorship_areas: Vec<String>,
    pub is_active: bool,
    pub profile_picture: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AccountRecord> for AccountBody {
    fn from(record: AccountRecord) -> Self {
        let full_name = format!("{} {}", record.first_name, record.last_name);
        let current_job = CurrentJob {
            title: record.job_title,
            company: record.job_company,
            location: record.job_location,
        };
        Self {
            id: record.id.to_string(),
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            full_name,
            role: record.role,
            phone: record.phone,
            graduation_year: record.graduation_year,
            department: record.department,
            current_job: (!current_job.is_empty()).then_some(current_job),
            bio: record.bio,
            linkedin_profile: record.linkedin_profile,
            is_mentor: record.is_mentor,
            mentorship_areas: record.mentorship_areas,
            is_active: record.is_active,
            profile_picture: record.profile_picture,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub graduation_year: Option<i32>,
    pub department: Option<String>,
    pub current_job: Option<CurrentJob>,
    pub bio: Option<String>,
    pub linkedin_profile: Option<String>,
    pub is_mentor: Option<bool>,
    pub mentorship_areas: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: AccountBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub success: bool,
    pub user: AccountBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub graduation_year: Option<i32>,
    pub department: Option<String>,
    pub current_job: Option<CurrentJob>,
    pub bio: Option<String>,
    pub linkedin_profile: Option<String>,
    pub is_mentor: Option<bool>,
    pub mentorship_areas: Option<Vec<String>>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use uuid::Uuid;

    fn record() -> AccountRecord {
        AccountRecord {
            id: Uuid::from_u128(11),
            email: "grace@example.com".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            role: Role::Alumni,
            phone: None,
            graduation_year: Some(1952),
            department: Some("Mathematics".to_string()),
            job_title: Some("Rear Admiral".to_string()),
            job_company: None,
            job_location: None,
            bio: None,
            linkedin_profile: None,
            is_mentor: true,
            mentorship_areas: vec!["career-guidance".to_string()],
            is_active: true,
            profile_picture: String::new(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn account_body_uses_camel_case_wire_names() -> Result<()> {
        let body = AccountBody::from(record());
        let value = serde_json::to_value(&body)?;
        assert_eq!(value["firstName"], "Grace");
        assert_eq!(value["fullName"], "Grace Hopper");
        assert_eq!(value["isMentor"], true);
        assert_eq!(value["graduationYear"], 1952);
        assert_eq!(value["currentJob"]["title"], "Rear Admiral");
        // The hash is not part of the type at all, but make the property explicit.
        assert!(value.get("password").is_none());
        assert!(value.get("passwordHash").is_none());
        Ok(())
    }

    #[test]
    fn empty_job_collapses_to_none() {
        let mut rec = record();
        rec.job_title = None;
        let body = AccountBody::from(rec);
        assert!(body.current_job.is_none());
    }

    #[test]
    fn register_request_accepts_camel_case() -> Result<()> {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "password": "Analytic1",
            "isMentor": true,
            "mentorshipAreas": ["technical-skills"]
        }))?;
        assert_eq!(request.first_name, "Ada");
        assert_eq!(request.is_mentor, Some(true));
        assert!(request.role.is_none());
        Ok(())
    }

    #[test]
    fn register_request_rejects_unknown_fields() {
        let result: Result<RegisterRequest, _> = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "password": "Analytic1",
            "passwordHash": "sneaky"
        }));
        assert!(result.is_err());
    }
}
