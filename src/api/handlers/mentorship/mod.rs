//! Mentorship request endpoints.
//!
//! Flow Overview:
//! 1) The guard has resolved the principal; party checks happen here.
//! 2) `lifecycle` decides whether a transition is allowed.
//! 3) `storage` applies it with a conditional update, re-checking the
//!    starting state at commit time.

pub mod lifecycle;
pub mod storage;
pub mod types;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use self::lifecycle::{
    LifecycleError, Party, ensure_ratable, ensure_respondable, ensure_schedulable,
};
use self::storage::{
    CreateOutcome, NewRequest, RequestFilter, RequestRecord, ScheduleFields, apply_rating,
    apply_response, apply_schedule, fetch_notes, fetch_request, insert_note, insert_request,
    list_requests as query_requests, lookup_mentor, promote_completed,
};
use self::types::{
    AreaCount, AverageRatings, CompleteRequest, CreateRequest, MENTORSHIP_AREAS, MentorshipStats,
    MentorshipStatsResponse, NoteRequest, NoteResponse, RequestBody, RequestListQuery,
    RequestListResponse, RequestResponse, RespondRequest, ScheduleRequest, ScheduleResponse,
    ScheduledMeetingBody,
};
use super::auth::principal::{Principal, Role, authorize};
use super::users::{page_count, pagination};
use super::{normalize_optional, valid_timestamp};
use crate::api::error::{ApiError, ErrorBody};

#[utoipa::path(
    get,
    path = "/api/mentorship",
    params(RequestListQuery),
    responses(
        (status = 200, description = "Mentorship requests visible to the caller.", body = RequestListResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    tag = "mentorship"
)]
pub async fn list_requests(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Query(query): Query<RequestListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit, offset) = pagination(query.page, query.limit);

    let side = match query.role.as_deref() {
        Some("mentor") => Some(Party::Mentor),
        Some("mentee") => Some(Party::Mentee),
        _ => None,
    };
    // Admins see everything unless they ask for one of their own sides.
    let viewer = if principal.is_admin() && side.is_none() {
        None
    } else {
        Some(principal.account_id)
    };

    let filter = RequestFilter {
        viewer,
        side,
        status: query.status,
        area: normalize_optional(query.area),
    };

    let (records, total) = query_requests(&pool, &filter, limit, offset).await?;
    let requests: Vec<RequestBody> = records
        .into_iter()
        .map(|record| RequestBody::from_record(record, None))
        .collect();

    Ok(Json(RequestListResponse {
        success: true,
        count: requests.len(),
        total,
        page,
        pages: page_count(total, limit),
        requests,
    }))
}

#[utoipa::path(
    get,
    path = "/api/mentorship/{id}",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Single request with follow-up notes.", body = RequestResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Caller is not a party to this request.", body = ErrorBody),
        (status = 404, description = "Request not found.", body = ErrorBody),
    ),
    tag = "mentorship"
)]
pub async fn get_request(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = parse_request_id(&id)?;
    let record = fetch_request(&pool, request_id)
        .await?
        .ok_or(ApiError::NotFound("Mentorship request not found"))?;

    if !principal.is_admin() && parties_of(&record).party_of(principal.account_id).is_none() {
        return Err(ApiError::Forbidden("Not authorized to view this request"));
    }

    let notes = fetch_notes(&pool, request_id).await?;
    Ok(Json(RequestResponse {
        success: true,
        message: None,
        request: RequestBody::from_record(record, Some(notes)),
    }))
}

#[utoipa::path(
    post,
    path = "/api/mentorship",
    request_body = CreateRequest,
    responses(
        (status = 201, description = "Request created in pending state.", body = RequestResponse),
        (status = 400, description = "Invalid mentor or payload.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 409, description = "A pending request for this pair already exists.", body = ErrorBody),
    ),
    tag = "mentorship"
)]
pub async fn create_request(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<CreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mentor_id = Uuid::parse_str(payload.mentor.trim())
        .map_err(|_| ApiError::invalid("mentor", "Invalid mentor"))?;

    if mentor_id == principal.account_id {
        return Err(ApiError::invalid(
            "mentor",
            "You cannot request mentorship from yourself",
        ));
    }

    let subject = payload.subject.trim().to_string();
    if subject.is_empty() || subject.len() > 200 {
        return Err(ApiError::invalid(
            "subject",
            "Subject must be between 1 and 200 characters",
        ));
    }
    let message = payload.message.trim().to_string();
    if message.is_empty() || message.len() > 1000 {
        return Err(ApiError::invalid(
            "message",
            "Message must be between 1 and 1000 characters",
        ));
    }
    let mentorship_area = payload.mentorship_area.trim().to_string();
    if !MENTORSHIP_AREAS.contains(&mentorship_area.as_str()) {
        return Err(ApiError::invalid(
            "mentorshipArea",
            "Please specify a valid area of mentorship",
        ));
    }

    let mentor = lookup_mentor(&pool, mentor_id).await?;
    let available = mentor.is_some_and(|m| m.is_mentor && m.is_active);
    if !available {
        return Err(ApiError::invalid(
            "mentor",
            "Invalid mentor or mentor is not available",
        ));
    }

    let tags = payload
        .tags
        .unwrap_or_default()
        .into_iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect();

    let outcome = insert_request(
        &pool,
        NewRequest {
            mentor_id,
            mentee_id: principal.account_id,
            subject,
            message,
            mentorship_area,
            tags,
        },
    )
    .await?;

    let request_id = match outcome {
        CreateOutcome::Created(id) => id,
        CreateOutcome::DuplicatePending => {
            return Err(ApiError::Conflict(
                "You already have a pending request with this mentor",
            ));
        }
    };

    let record = fetch_request(&pool, request_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("created request disappeared")))?;

    Ok((
        StatusCode::CREATED,
        Json(RequestResponse {
            success: true,
            message: Some("Mentorship request created successfully".to_string()),
            request: RequestBody::from_record(record, None),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/mentorship/{id}/respond",
    params(("id" = String, Path, description = "Request id")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Request accepted or declined.", body = RequestResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Only the mentor may respond.", body = ErrorBody),
        (status = 404, description = "Request not found.", body = ErrorBody),
        (status = 409, description = "Request already responded to.", body = ErrorBody),
    ),
    tag = "mentorship"
)]
pub async fn respond_to_request(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<RespondRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = parse_request_id(&id)?;
    let record = fetch_request(&pool, request_id)
        .await?
        .ok_or(ApiError::NotFound("Mentorship request not found"))?;

    // Mentor-only: the mentee sees the same 403 as an outsider.
    if record.mentor.id != principal.account_id {
        return Err(ApiError::Forbidden(
            "Only the mentor can respond to this request",
        ));
    }

    ensure_respondable(record.status).map_err(already_resolved)?;

    let mentor_response = normalize_optional(payload.mentor_response);
    if mentor_response.as_deref().is_some_and(|r| r.len() > 500) {
        return Err(ApiError::invalid(
            "mentorResponse",
            "Response cannot be more than 500 characters",
        ));
    }

    let status = payload.status.into_status();
    let applied =
        apply_response(&pool, request_id, status, mentor_response.as_deref()).await?;
    if !applied {
        // Lost the race with a concurrent response.
        return Err(ApiError::Conflict("This request has already been responded to"));
    }

    let record = fetch_request(&pool, request_id)
        .await?
        .ok_or(ApiError::NotFound("Mentorship request not found"))?;

    Ok(Json(RequestResponse {
        success: true,
        message: Some(format!("Request {status} successfully")),
        request: RequestBody::from_record(record, None),
    }))
}

#[utoipa::path(
    put,
    path = "/api/mentorship/{id}/schedule",
    params(("id" = String, Path, description = "Request id")),
    request_body = ScheduleRequest,
    responses(
        (status = 200, description = "Meeting scheduled.", body = ScheduleResponse),
        (status = 400, description = "Invalid meeting time.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Caller is not a party to this request.", body = ErrorBody),
        (status = 404, description = "Request not found.", body = ErrorBody),
        (status = 409, description = "Request is not accepted.", body = ErrorBody),
    ),
    tag = "mentorship"
)]
pub async fn schedule_meeting(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = parse_request_id(&id)?;
    let record = fetch_request(&pool, request_id)
        .await?
        .ok_or(ApiError::NotFound("Mentorship request not found"))?;

    if parties_of(&record).party_of(principal.account_id).is_none() {
        return Err(ApiError::Forbidden(
            "Not authorized to schedule meeting for this request",
        ));
    }

    ensure_schedulable(record.status).map_err(not_accepted_for_scheduling)?;

    let date_time = payload.date_time.trim().to_string();
    if !valid_timestamp(&date_time) {
        return Err(ApiError::invalid(
            "dateTime",
            "Please provide a valid meeting time",
        ));
    }
    let agenda = normalize_optional(payload.agenda);
    if agenda.as_deref().is_some_and(|a| a.len() > 500) {
        return Err(ApiError::invalid(
            "agenda",
            "Agenda cannot be more than 500 characters",
        ));
    }

    let fields = ScheduleFields {
        date_time,
        meeting_link: normalize_optional(payload.meeting_link),
        location: normalize_optional(payload.location),
        agenda,
    };

    if !apply_schedule(&pool, request_id, &fields).await? {
        return Err(ApiError::Conflict(
            "Can only schedule meetings for accepted requests",
        ));
    }

    let record = fetch_request(&pool, request_id)
        .await?
        .ok_or(ApiError::NotFound("Mentorship request not found"))?;
    let scheduled_meeting = record
        .meeting_at
        .map(|date_time| ScheduledMeetingBody {
            date_time,
            meeting_link: record.meeting_link,
            location: record.meeting_location,
            agenda: record.meeting_agenda,
        })
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("scheduled meeting missing")))?;

    Ok(Json(ScheduleResponse {
        success: true,
        message: "Meeting scheduled successfully".to_string(),
        scheduled_meeting,
    }))
}

#[utoipa::path(
    post,
    path = "/api/mentorship/{id}/notes",
    params(("id" = String, Path, description = "Request id")),
    request_body = NoteRequest,
    responses(
        (status = 201, description = "Note appended.", body = NoteResponse),
        (status = 400, description = "Missing note text.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Caller is not a party to this request.", body = ErrorBody),
        (status = 404, description = "Request not found.", body = ErrorBody),
    ),
    tag = "mentorship"
)]
pub async fn add_note(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<NoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = parse_request_id(&id)?;
    let record = fetch_request(&pool, request_id)
        .await?
        .ok_or(ApiError::NotFound("Mentorship request not found"))?;

    if parties_of(&record).party_of(principal.account_id).is_none() {
        return Err(ApiError::Forbidden(
            "Not authorized to add notes to this request",
        ));
    }

    let note = payload.note.trim().to_string();
    if note.is_empty() {
        return Err(ApiError::invalid("note", "Note is required"));
    }
    if note.len() > 500 {
        return Err(ApiError::invalid(
            "note",
            "Note cannot be more than 500 characters",
        ));
    }

    let record = insert_note(&pool, request_id, principal.account_id, &note).await?;

    Ok((
        StatusCode::CREATED,
        Json(NoteResponse {
            success: true,
            message: "Follow-up note added successfully".to_string(),
            note: record.into(),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/mentorship/{id}/complete",
    params(("id" = String, Path, description = "Request id")),
    request_body = CompleteRequest,
    responses(
        (status = 200, description = "Rating recorded; request completes once both halves exist.", body = RequestResponse),
        (status = 400, description = "Invalid rating.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Caller is not a party to this request.", body = ErrorBody),
        (status = 404, description = "Request not found.", body = ErrorBody),
        (status = 409, description = "Rating is not open in this state.", body = ErrorBody),
    ),
    tag = "mentorship"
)]
pub async fn complete_request(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<CompleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = parse_request_id(&id)?;
    let record = fetch_request(&pool, request_id)
        .await?
        .ok_or(ApiError::NotFound("Mentorship request not found"))?;

    let Some(party) = parties_of(&record).party_of(principal.account_id) else {
        return Err(ApiError::Forbidden("Not authorized to complete this request"));
    };

    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::invalid("rating", "Rating must be between 1 and 5"));
    }
    let feedback = normalize_optional(payload.feedback);
    if feedback.as_deref().is_some_and(|f| f.len() > 500) {
        return Err(ApiError::invalid(
            "feedback",
            "Feedback cannot be more than 500 characters",
        ));
    }

    ensure_ratable(record.status).map_err(rating_closed)?;

    let snapshot = apply_rating(
        &pool,
        request_id,
        party,
        payload.rating,
        feedback.as_deref(),
    )
    .await?
    .ok_or(ApiError::Conflict("Can only complete accepted requests"))?;

    let next = lifecycle::completion(
        snapshot.status,
        snapshot.mentor_rating,
        snapshot.mentee_rating,
    );
    if next == lifecycle::RequestStatus::Completed
        && snapshot.status == lifecycle::RequestStatus::Accepted
    {
        promote_completed(&pool, request_id).await?;
    }

    let record = fetch_request(&pool, request_id)
        .await?
        .ok_or(ApiError::NotFound("Mentorship request not found"))?;

    Ok(Json(RequestResponse {
        success: true,
        message: Some("Rating submitted successfully".to_string()),
        request: RequestBody::from_record(record, None),
    }))
}

#[utoipa::path(
    get,
    path = "/api/mentorship/admin/stats",
    responses(
        (status = 200, description = "Mentorship statistics.", body = MentorshipStatsResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Admin only.", body = ErrorBody),
    ),
    tag = "mentorship"
)]
pub async fn mentorship_stats(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&principal, &[Role::Admin])?;

    let totals = sqlx::query(
        r"
        SELECT
            count(*) AS total_requests,
            count(*) FILTER (WHERE status = 'pending') AS pending_requests,
            count(*) FILTER (WHERE status = 'accepted') AS accepted_requests,
            count(*) FILTER (WHERE status = 'completed') AS completed_requests
        FROM mentorship_requests
        ",
    )
    .fetch_one(&*pool)
    .await?;

    let by_area = sqlx::query(
        r"
        SELECT mentorship_area, count(*) AS count
        FROM mentorship_requests
        GROUP BY mentorship_area
        ORDER BY count DESC
        ",
    )
    .fetch_all(&*pool)
    .await?;

    let averages = sqlx::query(
        r"
        SELECT
            COALESCE(avg(mentor_rating), 0)::float8 AS avg_mentor_rating,
            COALESCE(avg(mentee_rating), 0)::float8 AS avg_mentee_rating
        FROM mentorship_requests
        WHERE status = 'completed'
        ",
    )
    .fetch_one(&*pool)
    .await?;

    let stats = MentorshipStats {
        total_requests: totals.get("total_requests"),
        pending_requests: totals.get("pending_requests"),
        accepted_requests: totals.get("accepted_requests"),
        completed_requests: totals.get("completed_requests"),
        requests_by_area: by_area
            .iter()
            .map(|row| AreaCount {
                mentorship_area: row.get("mentorship_area"),
                count: row.get("count"),
            })
            .collect(),
        average_ratings: AverageRatings {
            avg_mentor_rating: averages.get("avg_mentor_rating"),
            avg_mentee_rating: averages.get("avg_mentee_rating"),
        },
    };

    Ok(Json(MentorshipStatsResponse {
        success: true,
        stats,
    }))
}

fn parse_request_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id.trim()).map_err(|_| ApiError::invalid("id", "Invalid request id"))
}

fn parties_of(record: &RequestRecord) -> lifecycle::Parties {
    lifecycle::Parties {
        mentor: record.mentor.id,
        mentee: record.mentee.id,
    }
}

fn already_resolved(_: LifecycleError) -> ApiError {
    ApiError::Conflict("This request has already been responded to")
}

fn not_accepted_for_scheduling(_: LifecycleError) -> ApiError {
    ApiError::Conflict("Can only schedule meetings for accepted requests")
}

fn rating_closed(_: LifecycleError) -> ApiError {
    ApiError::Conflict("Can only complete accepted requests")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_parse() {
        assert!(parse_request_id("not-a-uuid").is_err());
        assert!(parse_request_id(" 8d3ce1f4-2c5a-4b7e-9d1f-5a6b7c8d9e0f ").is_ok());
    }
}
