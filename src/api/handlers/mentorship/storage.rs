//! Database helpers for mentorship requests.
//!
//! Transitions are single conditional `UPDATE` statements: the `WHERE status`
//! clause re-checks the lifecycle guard at commit time, so concurrent calls
//! cannot apply a transition twice.

use anyhow::{Context, Result};
use sqlx::{PgPool, QueryBuilder, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::lifecycle::{Party, RequestStatus};
use crate::api::error::is_unique_violation;

const REQUEST_COLUMNS: &str = r#"
    r.id,
    r.subject,
    r.message,
    r.mentorship_area,
    r.status,
    to_char(r.requested_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS requested_at,
    CASE
        WHEN r.responded_at IS NULL THEN NULL
        ELSE to_char(r.responded_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
    END AS responded_at,
    r.mentor_response,
    CASE
        WHEN r.meeting_at IS NULL THEN NULL
        ELSE to_char(r.meeting_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
    END AS meeting_at,
    r.meeting_link,
    r.meeting_location,
    r.meeting_agenda,
    r.mentor_rating,
    r.mentor_feedback,
    r.mentee_rating,
    r.mentee_feedback,
    r.tags,
    m.id AS mentor_id,
    m.first_name AS mentor_first_name,
    m.last_name AS mentor_last_name,
    m.email AS mentor_email,
    e.id AS mentee_id,
    e.first_name AS mentee_first_name,
    e.last_name AS mentee_last_name,
    e.email AS mentee_email
"#;

const REQUEST_FROM: &str = r"
    FROM mentorship_requests r
    JOIN users m ON m.id = r.mentor_id
    JOIN users e ON e.id = r.mentee_id
";

/// Party fields resolved through the join.
#[derive(Debug, Clone)]
pub struct PartyRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Full request row with both parties resolved.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub id: Uuid,
    pub mentor: PartyRecord,
    pub mentee: PartyRecord,
    pub subject: String,
    pub message: String,
    pub mentorship_area: String,
    pub status: RequestStatus,
    pub requested_at: String,
    pub responded_at: Option<String>,
    pub mentor_response: Option<String>,
    pub meeting_at: Option<String>,
    pub meeting_link: Option<String>,
    pub meeting_location: Option<String>,
    pub meeting_agenda: Option<String>,
    pub mentor_rating: Option<i16>,
    pub mentor_feedback: Option<String>,
    pub mentee_rating: Option<i16>,
    pub mentee_feedback: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub id: Uuid,
    pub note: String,
    pub author: PartyRecord,
    pub added_at: String,
}

/// Mentor fields checked before creating a request.
#[derive(Debug)]
pub struct MentorRecord {
    pub is_mentor: bool,
    pub is_active: bool,
}

#[derive(Debug)]
pub struct NewRequest {
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub subject: String,
    pub message: String,
    pub mentorship_area: String,
    pub tags: Vec<String>,
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(Uuid),
    DuplicatePending,
}

/// List filter assembled by the handler.
#[derive(Debug, Default)]
pub struct RequestFilter {
    /// `None` lists every request (admin); otherwise restrict to this viewer.
    pub viewer: Option<Uuid>,
    /// Restrict the viewer to one side of the request.
    pub side: Option<Party>,
    pub status: Option<RequestStatus>,
    pub area: Option<String>,
}

#[derive(Debug)]
pub struct ScheduleFields {
    pub date_time: String,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub agenda: Option<String>,
}

/// Ratings and status right after a rating write.
#[derive(Debug)]
pub struct RatingSnapshot {
    pub status: RequestStatus,
    pub mentor_rating: Option<i16>,
    pub mentee_rating: Option<i16>,
}

fn request_from_row(row: &PgRow) -> RequestRecord {
    let status: String = row.get("status");
    RequestRecord {
        id: row.get("id"),
        mentor: PartyRecord {
            id: row.get("mentor_id"),
            first_name: row.get("mentor_first_name"),
            last_name: row.get("mentor_last_name"),
            email: row.get("mentor_email"),
        },
        mentee: PartyRecord {
            id: row.get("mentee_id"),
            first_name: row.get("mentee_first_name"),
            last_name: row.get("mentee_last_name"),
            email: row.get("mentee_email"),
        },
        subject: row.get("subject"),
        message: row.get("message"),
        mentorship_area: row.get("mentorship_area"),
        // The column carries a CHECK constraint, so the parse cannot miss.
        status: status.parse().unwrap_or(RequestStatus::Pending),
        requested_at: row.get("requested_at"),
        responded_at: row.get("responded_at"),
        mentor_response: row.get("mentor_response"),
        meeting_at: row.get("meeting_at"),
        meeting_link: row.get("meeting_link"),
        meeting_location: row.get("meeting_location"),
        meeting_agenda: row.get("meeting_agenda"),
        mentor_rating: row.get("mentor_rating"),
        mentor_feedback: row.get("mentor_feedback"),
        mentee_rating: row.get("mentee_rating"),
        mentee_feedback: row.get("mentee_feedback"),
        tags: row.get("tags"),
    }
}

pub async fn fetch_request(pool: &PgPool, request_id: Uuid) -> Result<Option<RequestRecord>> {
    let query = format!("SELECT {REQUEST_COLUMNS} {REQUEST_FROM} WHERE r.id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(request_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch mentorship request")?;

    Ok(row.map(|row| request_from_row(&row)))
}

fn push_request_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &RequestFilter) {
    if let Some(viewer) = filter.viewer {
        match filter.side {
            Some(Party::Mentor) => {
                builder.push(" AND r.mentor_id = ");
                builder.push_bind(viewer);
            }
            Some(Party::Mentee) => {
                builder.push(" AND r.mentee_id = ");
                builder.push_bind(viewer);
            }
            None => {
                builder.push(" AND (r.mentor_id = ");
                builder.push_bind(viewer);
                builder.push(" OR r.mentee_id = ");
                builder.push_bind(viewer);
                builder.push(")");
            }
        }
    }
    if let Some(status) = filter.status {
        builder.push(" AND r.status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(area) = &filter.area {
        builder.push(" AND r.mentorship_area = ");
        builder.push_bind(area.clone());
    }
}

/// List requests newest-first with a separate total count.
pub async fn list_requests(
    pool: &PgPool,
    filter: &RequestFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<RequestRecord>, i64)> {
    let mut count_builder = QueryBuilder::new(format!(
        "SELECT count(*) {REQUEST_FROM} WHERE TRUE"
    ));
    push_request_filters(&mut count_builder, filter);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .context("failed to count mentorship requests")?;

    let mut builder = QueryBuilder::new(format!(
        "SELECT {REQUEST_COLUMNS} {REQUEST_FROM} WHERE TRUE"
    ));
    push_request_filters(&mut builder, filter);
    builder.push(" ORDER BY r.requested_at DESC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows = builder
        .build()
        .fetch_all(pool)
        .await
        .context("failed to list mentorship requests")?;

    Ok((rows.iter().map(request_from_row).collect(), total))
}

/// Mentor flags checked on create.
pub async fn lookup_mentor(pool: &PgPool, mentor_id: Uuid) -> Result<Option<MentorRecord>> {
    let query = "SELECT is_mentor, is_active FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(mentor_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup mentor")?;

    Ok(row.map(|row| MentorRecord {
        is_mentor: row.get("is_mentor"),
        is_active: row.get("is_active"),
    }))
}

/// Create a pending request. The partial unique index turns a concurrent
/// duplicate into [`CreateOutcome::DuplicatePending`].
pub async fn insert_request(pool: &PgPool, request: NewRequest) -> Result<CreateOutcome> {
    let query = r"
        INSERT INTO mentorship_requests
            (mentor_id, mentee_id, subject, message, mentorship_area, tags)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(request.mentor_id)
        .bind(request.mentee_id)
        .bind(&request.subject)
        .bind(&request.message)
        .bind(&request.mentorship_area)
        .bind(&request.tags)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(CreateOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::DuplicatePending),
        Err(err) => Err(err).context("failed to insert mentorship request"),
    }
}

/// Apply `pending -> accepted | declined`. Returns false when the request
/// was not pending anymore; `responded_at` is only ever written here.
pub async fn apply_response(
    pool: &PgPool,
    request_id: Uuid,
    status: RequestStatus,
    mentor_response: Option<&str>,
) -> Result<bool> {
    let query = r"
        UPDATE mentorship_requests
        SET status = $2, mentor_response = $3, responded_at = NOW()
        WHERE id = $1 AND status = 'pending'
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(request_id)
        .bind(status.as_str())
        .bind(mentor_response)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to respond to mentorship request")?;

    Ok(result.rows_affected() > 0)
}

/// Overwrite the embedded meeting record; only valid while accepted.
pub async fn apply_schedule(
    pool: &PgPool,
    request_id: Uuid,
    fields: &ScheduleFields,
) -> Result<bool> {
    let query = r"
        UPDATE mentorship_requests
        SET meeting_at = $2::timestamptz, meeting_link = $3, meeting_location = $4, meeting_agenda = $5
        WHERE id = $1 AND status = 'accepted'
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(request_id)
        .bind(&fields.date_time)
        .bind(&fields.meeting_link)
        .bind(&fields.location)
        .bind(&fields.agenda)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to schedule mentorship meeting")?;

    Ok(result.rows_affected() > 0)
}

/// Write one party's rating half; both halves are disjoint columns so
/// concurrent mentor/mentee writes do not clobber each other.
pub async fn apply_rating(
    pool: &PgPool,
    request_id: Uuid,
    party: Party,
    rating: i16,
    feedback: Option<&str>,
) -> Result<Option<RatingSnapshot>> {
    let query = match party {
        Party::Mentor => {
            r"
            UPDATE mentorship_requests
            SET mentor_rating = $2, mentor_feedback = $3
            WHERE id = $1 AND status IN ('accepted', 'completed')
            RETURNING status, mentor_rating, mentee_rating
            "
        }
        Party::Mentee => {
            r"
            UPDATE mentorship_requests
            SET mentee_rating = $2, mentee_feedback = $3
            WHERE id = $1 AND status IN ('accepted', 'completed')
            RETURNING status, mentor_rating, mentee_rating
            "
        }
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(request_id)
        .bind(rating)
        .bind(feedback)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to record mentorship rating")?;

    Ok(row.map(|row| {
        let status: String = row.get("status");
        RatingSnapshot {
            status: status.parse().unwrap_or(RequestStatus::Accepted),
            mentor_rating: row.get("mentor_rating"),
            mentee_rating: row.get("mentee_rating"),
        }
    }))
}

/// Flip `accepted -> completed` once both halves exist. Conditional on the
/// current status, so the flip is one-way even under concurrent calls.
pub async fn promote_completed(pool: &PgPool, request_id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE mentorship_requests
        SET status = 'completed'
        WHERE id = $1
          AND status = 'accepted'
          AND mentor_rating IS NOT NULL
          AND mentee_rating IS NOT NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(request_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to complete mentorship request")?;

    Ok(result.rows_affected() > 0)
}

/// Append an immutable follow-up note.
pub async fn insert_note(
    pool: &PgPool,
    request_id: Uuid,
    author_id: Uuid,
    note: &str,
) -> Result<NoteRecord> {
    let query = r#"
        WITH inserted AS (
            INSERT INTO mentorship_notes (request_id, author_id, note)
            VALUES ($1, $2, $3)
            RETURNING id, note, author_id, added_at
        )
        SELECT
            inserted.id,
            inserted.note,
            to_char(inserted.added_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS added_at,
            u.id AS author_id,
            u.first_name AS author_first_name,
            u.last_name AS author_last_name,
            u.email AS author_email
        FROM inserted
        JOIN users u ON u.id = inserted.author_id
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(request_id)
        .bind(author_id)
        .bind(note)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to append follow-up note")?;

    Ok(NoteRecord {
        id: row.get("id"),
        note: row.get("note"),
        author: PartyRecord {
            id: row.get("author_id"),
            first_name: row.get("author_first_name"),
            last_name: row.get("author_last_name"),
            email: row.get("author_email"),
        },
        added_at: row.get("added_at"),
    })
}

/// Notes in append order.
pub async fn fetch_notes(pool: &PgPool, request_id: Uuid) -> Result<Vec<NoteRecord>> {
    let query = r#"
        SELECT
            n.id,
            n.note,
            to_char(n.added_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS added_at,
            u.id AS author_id,
            u.first_name AS author_first_name,
            u.last_name AS author_last_name,
            u.email AS author_email
        FROM mentorship_notes n
        JOIN users u ON u.id = n.author_id
        WHERE n.request_id = $1
        ORDER BY n.added_at, n.id
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(request_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to fetch follow-up notes")?;

    Ok(rows
        .into_iter()
        .map(|row| NoteRecord {
            id: row.get("id"),
            note: row.get("note"),
            author: PartyRecord {
                id: row.get("author_id"),
                first_name: row.get("author_first_name"),
                last_name: row.get("author_last_name"),
                email: row.get("author_email"),
            },
            added_at: row.get("added_at"),
        })
        .collect())
}
