//! Event endpoints.
//!
//! Flow Overview:
//! 1) The guard has resolved the principal.
//! 2) Creation and mutation are gated to admins and alumni; updates and
//!    deletes additionally require the organizer (admins bypass).
//! 3) RSVPs run through a capacity-guarded transaction in storage.

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

use self::storage::{
    EventChanges, EventFilter, EventRecord, NewEvent, RsvpOutcome, deactivate_event, fetch_attendees,
    fetch_comments, fetch_event, insert_comment, insert_event, list_events as query_events,
    register_attendee, remove_attendee, timestamp_in_future, update_event as apply_event_changes,
};
use self::types::{
    CommentRequest, CreateEventRequest, EVENT_TYPES, EventBody, EventCommentResponse,
    EventListQuery, EventListResponse, EventResponse, EventStats, EventStatsResponse,
    MAX_ATTENDEE_LIMIT, TypeCount, UpdateEventRequest,
};
use super::auth::principal::{Principal, Role, authorize};
use super::auth::types::MessageResponse;
use super::users::{page_count, pagination};
use super::{normalize_optional, valid_event_time, valid_timestamp};
use crate::api::error::{ApiError, ErrorBody, is_check_violation, is_datetime_error};

#[utoipa::path(
    get,
    path = "/api/events",
    params(EventListQuery),
    responses(
        (status = 200, description = "Active events, filtered and paginated.", body = EventListResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    tag = "events"
)]
pub async fn list_events(
    Extension(_principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Query(query): Query<EventListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit, offset) = pagination(query.page, query.limit);

    let from_date = normalize_optional(query.from_date);
    if from_date.as_deref().is_some_and(|d| !valid_timestamp(d)) {
        return Err(ApiError::invalid("fromDate", "Please provide a valid date"));
    }
    let to_date = normalize_optional(query.to_date);
    if to_date.as_deref().is_some_and(|d| !valid_timestamp(d)) {
        return Err(ApiError::invalid("toDate", "Please provide a valid date"));
    }

    let filter = EventFilter {
        event_type: normalize_optional(query.event_type),
        from_date,
        to_date,
        upcoming: query.upcoming.unwrap_or(true),
        search: normalize_optional(query.search),
    };

    let (records, total) = query_events(&pool, &filter, limit, offset).await?;
    let events: Vec<EventBody> = records
        .into_iter()
        .map(|record| EventBody::from_record(record, None, None))
        .collect();

    Ok(Json(EventListResponse {
        success: true,
        count: events.len(),
        total,
        page,
        pages: page_count(total, limit),
        events,
    }))
}

#[utoipa::path(
    get,
    path = "/api/events/{id}",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Single event with attendees and comments.", body = EventResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 404, description = "Event not found.", body = ErrorBody),
    ),
    tag = "events"
)]
pub async fn get_event(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = parse_event_id(&id)?;
    let record = fetch_event(&pool, event_id)
        .await?
        .ok_or(ApiError::NotFound("Event not found"))?;

    let attendees = fetch_attendees(&pool, event_id).await?;
    let comments = fetch_comments(&pool, event_id).await?;

    Ok(Json(EventResponse {
        success: true,
        message: None,
        event: EventBody::from_record(record, Some(attendees), Some(comments)),
    }))
}

#[utoipa::path(
    post,
    path = "/api/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created.", body = EventResponse),
        (status = 400, description = "Validation failed.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Admins and alumni only.", body = ErrorBody),
    ),
    tag = "events"
)]
pub async fn create_event(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&principal, &[Role::Admin, Role::Alumni])?;

    let event = validate_new_event(&pool, &principal, payload).await?;

    let event_id = match insert_event(&pool, event).await {
        Ok(id) => id,
        Err(err) if is_check_violation(&err) => {
            return Err(ApiError::invalid(
                "registrationDeadline",
                "Registration deadline must be before event date",
            ));
        }
        Err(err) if is_datetime_error(&err) => {
            return Err(ApiError::invalid("eventDate", "Please provide a valid date"));
        }
        Err(err) => return Err(err.into()),
    };

    let record = fetch_event(&pool, event_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("created event disappeared")))?;

    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            success: true,
            message: Some("Event created successfully".to_string()),
            event: EventBody::from_record(record, None, None),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/events/{id}",
    params(("id" = String, Path, description = "Event id")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated.", body = EventResponse),
        (status = 400, description = "Validation failed.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Organizer or admin only.", body = ErrorBody),
        (status = 404, description = "Event not found.", body = ErrorBody),
    ),
    tag = "events"
)]
pub async fn update_event(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&principal, &[Role::Admin, Role::Alumni])?;
    let event_id = parse_event_id(&id)?;

    let record = fetch_event(&pool, event_id)
        .await?
        .ok_or(ApiError::NotFound("Event not found"))?;
    ensure_organizer(&principal, &record, "Not authorized to update this event")?;

    let changes = validate_event_changes(&pool, payload).await?;

    match apply_event_changes(&pool, event_id, changes).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::NotFound("Event not found")),
        Err(err) if is_check_violation(&err) => {
            return Err(ApiError::invalid(
                "registrationDeadline",
                "Registration deadline must be before event date",
            ));
        }
        Err(err) if is_datetime_error(&err) => {
            return Err(ApiError::invalid("eventDate", "Please provide a valid date"));
        }
        Err(err) => return Err(err.into()),
    }

    let record = fetch_event(&pool, event_id)
        .await?
        .ok_or(ApiError::NotFound("Event not found"))?;

    Ok(Json(EventResponse {
        success: true,
        message: Some("Event updated successfully".to_string()),
        event: EventBody::from_record(record, None, None),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event deactivated.", body = MessageResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Organizer or admin only.", body = ErrorBody),
        (status = 404, description = "Event not found.", body = ErrorBody),
    ),
    tag = "events"
)]
pub async fn delete_event(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&principal, &[Role::Admin, Role::Alumni])?;
    let event_id = parse_event_id(&id)?;

    let record = fetch_event(&pool, event_id)
        .await?
        .ok_or(ApiError::NotFound("Event not found"))?;
    ensure_organizer(&principal, &record, "Not authorized to delete this event")?;

    if !deactivate_event(&pool, event_id).await? {
        return Err(ApiError::NotFound("Event not found"));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "Event deleted successfully".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/events/{id}/rsvp",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Registered for the event.", body = MessageResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 404, description = "Event not found.", body = ErrorBody),
        (status = 409, description = "Closed, full, or already registered.", body = ErrorBody),
    ),
    tag = "events"
)]
pub async fn rsvp_event(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = parse_event_id(&id)?;

    match register_attendee(&pool, event_id, principal.account_id).await? {
        RsvpOutcome::Registered => Ok(Json(MessageResponse {
            success: true,
            message: "Successfully registered for event".to_string(),
        })),
        RsvpOutcome::NotFound => Err(ApiError::NotFound("Event not found")),
        RsvpOutcome::RegistrationClosed => {
            Err(ApiError::Conflict("Registration is closed for this event"))
        }
        RsvpOutcome::EventFull => Err(ApiError::Conflict("Event is full")),
        RsvpOutcome::AlreadyRegistered => Err(ApiError::Conflict(
            "You are already registered for this event",
        )),
    }
}

#[utoipa::path(
    delete,
    path = "/api/events/{id}/rsvp",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Registration cancelled.", body = MessageResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 404, description = "Event not found.", body = ErrorBody),
        (status = 409, description = "Caller was not registered.", body = ErrorBody),
    ),
    tag = "events"
)]
pub async fn cancel_rsvp(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = parse_event_id(&id)?;

    fetch_event(&pool, event_id)
        .await?
        .ok_or(ApiError::NotFound("Event not found"))?;

    if !remove_attendee(&pool, event_id, principal.account_id).await? {
        return Err(ApiError::Conflict("You are not registered for this event"));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "Successfully cancelled registration".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/events/{id}/comments",
    params(("id" = String, Path, description = "Event id")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added.", body = EventCommentResponse),
        (status = 400, description = "Missing comment text.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 404, description = "Event not found.", body = ErrorBody),
    ),
    tag = "events"
)]
pub async fn add_comment(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = parse_event_id(&id)?;

    fetch_event(&pool, event_id)
        .await?
        .ok_or(ApiError::NotFound("Event not found"))?;

    let comment = payload.comment.trim().to_string();
    if comment.is_empty() {
        return Err(ApiError::invalid("comment", "Comment is required"));
    }
    if comment.len() > 500 {
        return Err(ApiError::invalid(
            "comment",
            "Comment cannot be more than 500 characters",
        ));
    }

    let record = insert_comment(&pool, event_id, principal.account_id, &comment).await?;

    Ok((
        StatusCode::CREATED,
        Json(EventCommentResponse {
            success: true,
            message: "Comment added successfully".to_string(),
            comment: record.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/events/admin/stats",
    responses(
        (status = 200, description = "Event statistics.", body = EventStatsResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Admin only.", body = ErrorBody),
    ),
    tag = "events"
)]
pub async fn event_stats(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&principal, &[Role::Admin])?;

    let totals = sqlx::query(
        r"
        SELECT
            count(*) AS total_events,
            count(*) FILTER (WHERE event_date >= NOW()) AS upcoming_events
        FROM events
        WHERE is_active = TRUE
        ",
    )
    .fetch_one(&*pool)
    .await?;

    let by_type = sqlx::query(
        r"
        SELECT event_type, count(*) AS count
        FROM events
        WHERE is_active = TRUE
        GROUP BY event_type
        ORDER BY count DESC
        ",
    )
    .fetch_all(&*pool)
    .await?;

    let total_attendees: i64 = sqlx::query_scalar(
        r"
        SELECT count(*)
        FROM event_attendees a
        JOIN events ev ON ev.id = a.event_id
        WHERE ev.is_active = TRUE
        ",
    )
    .fetch_one(&*pool)
    .await?;

    let stats = EventStats {
        total_events: totals.get("total_events"),
        upcoming_events: totals.get("upcoming_events"),
        events_by_type: by_type
            .iter()
            .map(|row| TypeCount {
                event_type: row.get("event_type"),
                count: row.get("count"),
            })
            .collect(),
        total_attendees,
    };

    Ok(Json(EventStatsResponse {
        success: true,
        stats,
    }))
}

fn parse_event_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id.trim()).map_err(|_| ApiError::invalid("id", "Invalid event id"))
}

/// Admin bypasses ownership; otherwise the acting account must be the
/// organizer.
fn ensure_organizer(
    principal: &Principal,
    record: &EventRecord,
    message: &'static str,
) -> Result<(), ApiError> {
    if principal.is_admin() || record.organizer.id == principal.account_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(message))
    }
}

async fn validate_new_event(
    pool: &PgPool,
    principal: &Principal,
    payload: CreateEventRequest,
) -> Result<NewEvent, ApiError> {
    let title = payload.title.trim().to_string();
    if title.is_empty() || title.len() > 200 {
        return Err(ApiError::invalid(
            "title",
            "Event title must be between 1 and 200 characters",
        ));
    }
    let description = payload.description.trim().to_string();
    if description.is_empty() || description.len() > 2000 {
        return Err(ApiError::invalid(
            "description",
            "Event description must be between 1 and 2000 characters",
        ));
    }
    let location = payload.location.trim().to_string();
    if location.is_empty() || location.len() > 200 {
        return Err(ApiError::invalid(
            "location",
            "Location must be between 1 and 200 characters",
        ));
    }
    if !valid_event_time(payload.event_time.trim()) {
        return Err(ApiError::invalid(
            "eventTime",
            "Please provide valid time in HH:MM format",
        ));
    }
    let event_type = payload.event_type.trim().to_string();
    if !EVENT_TYPES.contains(&event_type.as_str()) {
        return Err(ApiError::invalid("eventType", "Please specify a valid event type"));
    }
    if payload
        .max_attendees
        .is_some_and(|max| !(1..=MAX_ATTENDEE_LIMIT).contains(&max))
    {
        return Err(ApiError::invalid(
            "maxAttendees",
            "Maximum attendees must be between 1 and 10000",
        ));
    }

    let is_virtual = payload.is_virtual.unwrap_or(false);
    let virtual_link = normalize_optional(payload.virtual_link);
    if is_virtual && virtual_link.is_none() {
        return Err(ApiError::invalid(
            "virtualLink",
            "Virtual events must have a valid meeting link",
        ));
    }
    if virtual_link
        .as_deref()
        .is_some_and(|link| !link.starts_with("http://") && !link.starts_with("https://"))
    {
        return Err(ApiError::invalid(
            "virtualLink",
            "Virtual events must have a valid meeting link",
        ));
    }

    let event_date = payload.event_date.trim().to_string();
    ensure_future_date(pool, &event_date).await?;

    let registration_deadline = normalize_optional(payload.registration_deadline);
    if registration_deadline
        .as_deref()
        .is_some_and(|d| !valid_timestamp(d))
    {
        return Err(ApiError::invalid(
            "registrationDeadline",
            "Please provide a valid date",
        ));
    }

    Ok(NewEvent {
        organizer_id: principal.account_id,
        title,
        description,
        event_date,
        event_time: payload.event_time.trim().to_string(),
        location,
        event_type,
        max_attendees: payload.max_attendees,
        is_virtual,
        virtual_link,
        tags: normalize_tags(payload.tags),
        image_url: normalize_optional(payload.image_url),
        registration_deadline,
    })
}

async fn validate_event_changes(
    pool: &PgPool,
    payload: UpdateEventRequest,
) -> Result<EventChanges, ApiError> {
    let title = normalize_optional(payload.title);
    if title.as_deref().is_some_and(|t| t.len() > 200) {
        return Err(ApiError::invalid(
            "title",
            "Event title must be between 1 and 200 characters",
        ));
    }
    let description = normalize_optional(payload.description);
    if description.as_deref().is_some_and(|d| d.len() > 2000) {
        return Err(ApiError::invalid(
            "description",
            "Event description must be between 1 and 2000 characters",
        ));
    }
    let location = normalize_optional(payload.location);
    if location.as_deref().is_some_and(|l| l.len() > 200) {
        return Err(ApiError::invalid(
            "location",
            "Location must be between 1 and 200 characters",
        ));
    }
    let event_time = normalize_optional(payload.event_time);
    if event_time.as_deref().is_some_and(|t| !valid_event_time(t)) {
        return Err(ApiError::invalid(
            "eventTime",
            "Please provide valid time in HH:MM format",
        ));
    }
    let event_type = normalize_optional(payload.event_type);
    if event_type
        .as_deref()
        .is_some_and(|t| !EVENT_TYPES.contains(&t))
    {
        return Err(ApiError::invalid("eventType", "Please specify a valid event type"));
    }
    if payload
        .max_attendees
        .is_some_and(|max| !(1..=MAX_ATTENDEE_LIMIT).contains(&max))
    {
        return Err(ApiError::invalid(
            "maxAttendees",
            "Maximum attendees must be between 1 and 10000",
        ));
    }
    let virtual_link = normalize_optional(payload.virtual_link);
    if virtual_link
        .as_deref()
        .is_some_and(|link| !link.starts_with("http://") && !link.starts_with("https://"))
    {
        return Err(ApiError::invalid(
            "virtualLink",
            "Virtual events must have a valid meeting link",
        ));
    }

    let event_date = normalize_optional(payload.event_date);
    if let Some(event_date) = &event_date {
        ensure_future_date(pool, event_date).await?;
    }

    let registration_deadline = normalize_optional(payload.registration_deadline);
    if registration_deadline
        .as_deref()
        .is_some_and(|d| !valid_timestamp(d))
    {
        return Err(ApiError::invalid(
            "registrationDeadline",
            "Please provide a valid date",
        ));
    }

    Ok(EventChanges {
        title,
        description,
        event_date,
        event_time,
        location,
        event_type,
        max_attendees: payload.max_attendees,
        is_virtual: payload.is_virtual,
        virtual_link,
        tags: payload.tags.map(|tags| normalize_tags(Some(tags))),
        image_url: normalize_optional(payload.image_url),
        registration_deadline,
    })
}

async fn ensure_future_date(pool: &PgPool, event_date: &str) -> Result<(), ApiError> {
    if !valid_timestamp(event_date) {
        return Err(ApiError::invalid("eventDate", "Please provide a valid date"));
    }
    match timestamp_in_future(pool, event_date).await? {
        Some(true) => Ok(()),
        Some(false) => Err(ApiError::invalid(
            "eventDate",
            "Event date must be in the future",
        )),
        None => Err(ApiError::invalid("eventDate", "Please provide a valid date")),
    }
}

fn normalize_tags(tags: Option<Vec<String>>) -> Vec<String> {
    tags.unwrap_or_default()
        .into_iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_parse() {
        assert!(parse_event_id("nope").is_err());
        assert!(parse_event_id("8d3ce1f4-2c5a-4b7e-9d1f-5a6b7c8d9e0f").is_ok());
    }

    #[test]
    fn tags_normalize_to_lowercase() {
        let tags = normalize_tags(Some(vec![
            " Networking ".to_string(),
            String::new(),
            "ALUMNI".to_string(),
        ]));
        assert_eq!(tags, vec!["networking".to_string(), "alumni".to_string()]);
    }

    #[test]
    fn organizer_check_admin_bypass() {
        use super::storage::UserRef;
        use uuid::Uuid;

        let organizer = Uuid::from_u128(1);
        let someone_else = Uuid::from_u128(2);
        let record = EventRecord {
            id: Uuid::from_u128(5),
            organizer: UserRef {
                id: organizer,
                first_name: "O".to_string(),
                last_name: "O".to_string(),
                email: "o@example.com".to_string(),
                role: Some("alumni".to_string()),
            },
            title: String::new(),
            description: String::new(),
            event_date: String::new(),
            event_time: String::new(),
            location: String::new(),
            event_type: "other".to_string(),
            max_attendees: None,
            is_virtual: false,
            virtual_link: None,
            attendee_count: 0,
            is_registration_open: true,
            tags: Vec::new(),
            image_url: None,
            is_active: true,
            registration_deadline: None,
            created_at: String::new(),
            updated_at: String::new(),
        };

        let admin = Principal {
            account_id: someone_else,
            email: "a@example.com".to_string(),
            role: Role::Admin,
        };
        assert!(ensure_organizer(&admin, &record, "nope").is_ok());

        let owner = Principal {
            account_id: organizer,
            email: "o@example.com".to_string(),
            role: Role::Alumni,
        };
        assert!(ensure_organizer(&owner, &record, "nope").is_ok());

        let outsider = Principal {
            account_id: someone_else,
            email: "x@example.com".to_string(),
            role: Role::Alumni,
        };
        assert!(matches!(
            ensure_organizer(&outsider, &record, "nope"),
            Err(ApiError::Forbidden(_))
        ));
    }
}
