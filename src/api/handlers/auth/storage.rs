//! Database helpers for the credential store.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::principal::Role;
use crate::api::error::is_unique_violation;

/// Columns every sanitized account read selects. The password hash is only
/// fetched by [`lookup_credentials`].
pub(crate) const ACCOUNT_COLUMNS: &str = r#"
    id,
    email,
    first_name,
    last_name,
    role,
    phone,
    graduation_year,
    department,
    job_title,
    job_company,
    job_location,
    bio,
    linkedin_url,
    is_mentor,
    mentorship_areas,
    is_active,
    profile_picture,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

/// Full sanitized account row.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub graduation_year: Option<i32>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub job_company: Option<String>,
    pub job_location: Option<String>,
    pub bio: Option<String>,
    pub linkedin_profile: Option<String>,
    pub is_mentor: bool,
    pub mentorship_areas: Vec<String>,
    pub is_active: bool,
    pub profile_picture: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Minimal fields the guard needs to resolve a token subject.
#[derive(Debug)]
pub struct PrincipalRecord {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub is_active: bool,
}

/// Minimal fields needed to check a login attempt.
#[derive(Debug)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub password_hash: String,
    pub is_active: bool,
}

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub enum SignupOutcome {
    Created(AccountRecord),
    EmailTaken,
}

/// New-account fields, already validated and normalized.
#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub graduation_year: Option<i32>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub job_company: Option<String>,
    pub job_location: Option<String>,
    pub bio: Option<String>,
    pub linkedin_profile: Option<String>,
    pub is_mentor: bool,
    pub mentorship_areas: Vec<String>,
}

/// Allow-listed profile changes; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub graduation_year: Option<i32>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub job_company: Option<String>,
    pub job_location: Option<String>,
    pub bio: Option<String>,
    pub linkedin_profile: Option<String>,
    pub is_mentor: Option<bool>,
    pub mentorship_areas: Option<Vec<String>>,
    pub profile_picture: Option<String>,
}

pub(crate) fn account_from_row(row: &PgRow) -> AccountRecord {
    let role: String = row.get("role");
    AccountRecord {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        // The column carries a CHECK constraint, so the parse cannot miss.
        role: role.parse().unwrap_or(Role::Alumni),
        phone: row.get("phone"),
        graduation_year: row.get("graduation_year"),
        department: row.get("department"),
        job_title: row.get("job_title"),
        job_company: row.get("job_company"),
        job_location: row.get("job_location"),
        bio: row.get("bio"),
        linkedin_profile: row.get("linkedin_url"),
        is_mentor: row.get("is_mentor"),
        mentorship_areas: row.get("mentorship_areas"),
        is_active: row.get("is_active"),
        profile_picture: row.get("profile_picture"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Resolve a token subject to its account for the guard.
pub async fn lookup_principal(pool: &PgPool, account_id: Uuid) -> Result<Option<PrincipalRecord>> {
    let query = "SELECT id, email, role, is_active FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup principal")?;

    Ok(row.map(|row| PrincipalRecord {
        id: row.get("id"),
        email: row.get("email"),
        role: row.get("role"),
        is_active: row.get("is_active"),
    }))
}

/// Look up login data by normalized email.
pub async fn lookup_credentials(pool: &PgPool, email: &str) -> Result<Option<CredentialRecord>> {
    let query = "SELECT id, password_hash, is_active FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credentials")?;

    Ok(row.map(|row| CredentialRecord {
        id: row.get("id"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
    }))
}

/// Fetch one sanitized account.
pub async fn fetch_account(pool: &PgPool, account_id: Uuid) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch account")?;

    Ok(row.map(|row| account_from_row(&row)))
}

/// Insert a new account; a duplicate email maps to [`SignupOutcome::EmailTaken`].
pub async fn insert_account(pool: &PgPool, account: NewAccount) -> Result<SignupOutcome> {
    let query = format!(
        r"
        INSERT INTO users
            (email, password_hash, first_name, last_name, role, phone, graduation_year,
             department, job_title, job_company, job_location, bio, linkedin_url,
             is_mentor, mentorship_areas)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING {ACCOUNT_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.role.as_str())
        .bind(&account.phone)
        .bind(account.graduation_year)
        .bind(&account.department)
        .bind(&account.job_title)
        .bind(&account.job_company)
        .bind(&account.job_location)
        .bind(&account.bio)
        .bind(&account.linkedin_profile)
        .bind(account.is_mentor)
        .bind(&account.mentorship_areas)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(account_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::EmailTaken),
        Err(err) => Err(err).context("failed to insert account"),
    }
}

/// Apply allow-listed profile changes and return the updated account.
pub async fn update_profile(
    pool: &PgPool,
    account_id: Uuid,
    changes: ProfileChanges,
) -> Result<Option<AccountRecord>> {
    let query = format!(
        r"
        UPDATE users
        SET
            first_name = COALESCE($1, first_name),
            last_name = COALESCE($2, last_name),
            phone = COALESCE($3, phone),
            graduation_year = COALESCE($4, graduation_year),
            department = COALESCE($5, department),
            job_title = COALESCE($6, job_title),
            job_company = COALESCE($7, job_company),
            job_location = COALESCE($8, job_location),
            bio = COALESCE($9, bio),
            linkedin_url = COALESCE($10, linkedin_url),
            is_mentor = COALESCE($11, is_mentor),
            mentorship_areas = COALESCE($12, mentorship_areas),
            profile_picture = COALESCE($13, profile_picture),
            updated_at = NOW()
        WHERE id = $14
        RETURNING {ACCOUNT_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.phone)
        .bind(changes.graduation_year)
        .bind(&changes.department)
        .bind(&changes.job_title)
        .bind(&changes.job_company)
        .bind(&changes.job_location)
        .bind(&changes.bio)
        .bind(&changes.linkedin_profile)
        .bind(changes.is_mentor)
        .bind(&changes.mentorship_areas)
        .bind(&changes.profile_picture)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update profile")?;

    Ok(row.map(|row| account_from_row(&row)))
}

/// Fetch the stored password hash for a re-authentication check.
pub async fn fetch_password_hash(pool: &PgPool, account_id: Uuid) -> Result<Option<String>> {
    let query = "SELECT password_hash FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch password hash")?;

    Ok(row.map(|row| row.get("password_hash")))
}

/// Replace the stored password hash.
pub async fn update_password(pool: &PgPool, account_id: Uuid, password_hash: &str) -> Result<bool> {
    let query = "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(password_hash)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;

    Ok(result.rows_affected() > 0)
}
