//! Alumni directory endpoints.
//!
//! Flow Overview:
//! 1) The guard has authenticated the request and attached a principal.
//! 2) List endpoints build a conjunction of optional filters.
//! 3) Mutations are admin-gated; deletes deactivate, never remove.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder, Row};
use tracing::Instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::auth::principal::{Principal, Role, authorize};
use super::auth::storage::{ACCOUNT_COLUMNS, AccountRecord, account_from_row};
use super::auth::types::AccountBody;
use super::normalize_optional;
use crate::api::error::{ApiError, ErrorBody, is_unique_violation};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Substring match across names, department, and company.
    pub search: Option<String>,
    pub department: Option<String>,
    pub graduation_year: Option<i32>,
    pub role: Option<Role>,
    pub mentors_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MentorListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    /// Substring match against declared mentorship areas.
    pub area: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub users: Vec<AccountBody>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub success: bool,
    pub user: AccountBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDeletedResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdminUserUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub graduation_year: Option<i32>,
    pub department: Option<String>,
    pub bio: Option<String>,
    pub is_mentor: Option<bool>,
    pub mentorship_areas: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct YearCount {
    pub year: i32,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentCount {
    pub department: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: i64,
    pub total_alumni: i64,
    pub total_students: i64,
    pub total_mentors: i64,
    pub users_by_year: Vec<YearCount>,
    pub users_by_department: Vec<DepartmentCount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserStatsResponse {
    pub success: bool,
    pub stats: UserStats,
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Alumni directory, filtered and paginated.", body = UserListResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn list_users(
    Extension(_principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit, offset) = pagination(query.page, query.limit);

    let mut count_builder = QueryBuilder::new("SELECT count(*) FROM users WHERE is_active = TRUE");
    push_user_filters(&mut count_builder, &query);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&*pool)
        .await?;

    let mut builder = QueryBuilder::new(format!(
        "SELECT {ACCOUNT_COLUMNS} FROM users WHERE is_active = TRUE"
    ));
    push_user_filters(&mut builder, &query);
    builder.push(" ORDER BY first_name, last_name LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows = builder.build().fetch_all(&*pool).await?;
    let users: Vec<AccountBody> = rows
        .iter()
        .map(|row| AccountBody::from(account_from_row(row)))
        .collect();

    Ok(Json(UserListResponse {
        success: true,
        count: users.len(),
        total,
        page,
        pages: page_count(total, limit),
        users,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/mentors",
    params(MentorListQuery),
    responses(
        (status = 200, description = "Active mentors, filtered and paginated.", body = UserListResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn list_mentors(
    Extension(_principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Query(query): Query<MentorListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit, offset) = pagination(query.page, query.limit);

    let mut count_builder = QueryBuilder::new(
        "SELECT count(*) FROM users WHERE is_active = TRUE AND is_mentor = TRUE",
    );
    push_mentor_filters(&mut count_builder, &query);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&*pool)
        .await?;

    let mut builder = QueryBuilder::new(format!(
        "SELECT {ACCOUNT_COLUMNS} FROM users WHERE is_active = TRUE AND is_mentor = TRUE"
    ));
    push_mentor_filters(&mut builder, &query);
    builder.push(" ORDER BY first_name, last_name LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows = builder.build().fetch_all(&*pool).await?;
    let users: Vec<AccountBody> = rows
        .iter()
        .map(|row| AccountBody::from(account_from_row(row)))
        .collect();

    Ok(Json(UserListResponse {
        success: true,
        count: users.len(),
        total,
        page,
        pages: page_count(total, limit),
        users,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Single user.", body = UserResponse),
        (status = 400, description = "Invalid user id.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = parse_user_id(&id)?;
    let record = super::auth::storage::fetch_account(&pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(UserResponse {
        success: true,
        user: record.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = AdminUserUpdateRequest,
    responses(
        (status = 200, description = "User updated.", body = UserResponse),
        (status = 400, description = "Invalid input.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Admin only.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
        (status = 409, description = "Email already in use.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn update_user(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<AdminUserUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&principal, &[Role::Admin])?;
    let user_id = parse_user_id(&id)?;

    let record = apply_admin_update(&pool, user_id, payload).await?;

    Ok(Json(UserResponse {
        success: true,
        user: record.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated.", body = UserDeletedResponse),
        (status = 400, description = "Invalid user id.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Admin only.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&principal, &[Role::Admin])?;
    let user_id = parse_user_id(&id)?;

    // Soft delete: rows stay referenceable from events and requests.
    let query = "UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(&*pool)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("User not found"));
    }

    Ok(Json(UserDeletedResponse {
        success: true,
        message: "User deactivated successfully".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/admin/stats",
    responses(
        (status = 200, description = "Directory statistics.", body = UserStatsResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Admin only.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn user_stats(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&principal, &[Role::Admin])?;

    let totals = sqlx::query(
        r"
        SELECT
            count(*) AS total_users,
            count(*) FILTER (WHERE role = 'alumni') AS total_alumni,
            count(*) FILTER (WHERE role = 'student') AS total_students,
            count(*) FILTER (WHERE is_mentor) AS total_mentors
        FROM users
        WHERE is_active = TRUE
        ",
    )
    .fetch_one(&*pool)
    .await?;

    let by_year = sqlx::query(
        r"
        SELECT graduation_year, count(*) AS count
        FROM users
        WHERE is_active = TRUE AND graduation_year IS NOT NULL
        GROUP BY graduation_year
        ORDER BY graduation_year
        ",
    )
    .fetch_all(&*pool)
    .await?;

    let by_department = sqlx::query(
        r"
        SELECT department, count(*) AS count
        FROM users
        WHERE is_active = TRUE AND department IS NOT NULL AND department <> ''
        GROUP BY department
        ORDER BY count DESC
        ",
    )
    .fetch_all(&*pool)
    .await?;

    let stats = UserStats {
        total_users: totals.get("total_users"),
        total_alumni: totals.get("total_alumni"),
        total_students: totals.get("total_students"),
        total_mentors: totals.get("total_mentors"),
        users_by_year: by_year
            .iter()
            .map(|row| YearCount {
                year: row.get("graduation_year"),
                count: row.get("count"),
            })
            .collect(),
        users_by_department: by_department
            .iter()
            .map(|row| DepartmentCount {
                department: row.get("department"),
                count: row.get("count"),
            })
            .collect(),
    };

    Ok(Json(UserStatsResponse {
        success: true,
        stats,
    }))
}

fn parse_user_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id.trim()).map_err(|_| ApiError::invalid("id", "Invalid user id"))
}

/// Clamp page/limit and derive the row offset.
pub(crate) fn pagination(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit, (page - 1) * limit)
}

pub(crate) fn page_count(total: i64, limit: i64) -> i64 {
    if total == 0 { 0 } else { (total + limit - 1) / limit }
}

fn push_user_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, query: &UserListQuery) {
    if let Some(search) = normalize_optional(query.search.clone()) {
        let pattern = format!("%{search}%");
        builder.push(" AND (first_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR last_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR department ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR job_company ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(department) = normalize_optional(query.department.clone()) {
        builder.push(" AND department ILIKE ");
        builder.push_bind(format!("%{department}%"));
    }
    if let Some(year) = query.graduation_year {
        builder.push(" AND graduation_year = ");
        builder.push_bind(year);
    }
    if let Some(role) = query.role {
        builder.push(" AND role = ");
        builder.push_bind(role.as_str());
    }
    if query.mentors_only == Some(true) {
        builder.push(" AND is_mentor = TRUE");
    }
}

fn push_mentor_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, query: &MentorListQuery) {
    if let Some(area) = normalize_optional(query.area.clone()) {
        // Substring match against any declared area.
        builder.push(" AND EXISTS (SELECT 1 FROM unnest(mentorship_areas) AS area WHERE area ILIKE ");
        builder.push_bind(format!("%{area}%"));
        builder.push(")");
    }
    if let Some(search) = normalize_optional(query.search.clone()) {
        let pattern = format!("%{search}%");
        builder.push(" AND (first_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR last_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR department ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR job_company ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

async fn apply_admin_update(
    pool: &PgPool,
    user_id: Uuid,
    payload: AdminUserUpdateRequest,
) -> Result<AccountRecord, ApiError> {
    let email = payload.email.map(|email| super::normalize_email(&email));
    if email.as_deref().is_some_and(|e| !super::valid_email(e)) {
        return Err(ApiError::invalid("email", "Please provide a valid email"));
    }
    if payload
        .graduation_year
        .is_some_and(|year| !super::valid_graduation_year(year))
    {
        return Err(ApiError::invalid(
            "graduationYear",
            "Please provide a valid graduation year",
        ));
    }

    let query = format!(
        r"
        UPDATE users
        SET
            first_name = COALESCE($1, first_name),
            last_name = COALESCE($2, last_name),
            email = COALESCE($3, email),
            role = COALESCE($4, role),
            phone = COALESCE($5, phone),
            graduation_year = COALESCE($6, graduation_year),
            department = COALESCE($7, department),
            bio = COALESCE($8, bio),
            is_mentor = COALESCE($9, is_mentor),
            mentorship_areas = COALESCE($10, mentorship_areas),
            is_active = COALESCE($11, is_active),
            profile_picture = COALESCE($12, profile_picture),
            updated_at = NOW()
        WHERE id = $13
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
        .bind(normalize_optional(payload.first_name))
        .bind(normalize_optional(payload.last_name))
        .bind(email)
        .bind(payload.role.map(Role::as_str))
        .bind(normalize_optional(payload.phone))
        .bind(payload.graduation_year)
        .bind(normalize_optional(payload.department))
        .bind(normalize_optional(payload.bio))
        .bind(payload.is_mentor)
        .bind(payload.mentorship_areas)
        .bind(payload.is_active)
        .bind(payload.profile_picture)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => Ok(account_from_row(&row)),
        Ok(None) => Err(ApiError::NotFound("User not found")),
        Err(err) if is_unique_violation(&err) => {
            Err(ApiError::Conflict("User already exists with this email"))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        assert_eq!(pagination(None, None), (1, 10, 0));
    }

    #[test]
    fn pagination_clamps_out_of_range_values() {
        assert_eq!(pagination(Some(0), Some(0)), (1, 1, 0));
        assert_eq!(pagination(Some(-3), Some(1000)), (1, 100, 0));
        assert_eq!(pagination(Some(3), Some(20)), (3, 20, 40));
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
    }

    #[test]
    fn list_query_uses_camel_case_params() {
        let query: UserListQuery = serde_json::from_value(serde_json::json!({
            "page": 2,
            "graduationYear": 2015,
            "mentorsOnly": true,
            "role": "student"
        }))
        .expect("parse query");
        assert_eq!(query.page, Some(2));
        assert_eq!(query.graduation_year, Some(2015));
        assert_eq!(query.mentors_only, Some(true));
        assert_eq!(query.role, Some(Role::Student));
    }
}
