//! Database helpers for events and their attendee/comment collections.
//!
//! Attendees and comments are owned child tables mutated through explicit
//! append/remove operations, never by rewriting the parent row. RSVP runs in
//! a short transaction with the event row locked, the one place a
//! check-then-insert would otherwise race past capacity.

use anyhow::{Context, Result};
use sqlx::{PgPool, QueryBuilder, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::error::is_unique_violation;

const EVENT_COLUMNS: &str = r#"
    ev.id,
    ev.title,
    ev.description,
    to_char(ev.event_date AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS event_date,
    ev.event_time,
    ev.location,
    ev.event_type,
    ev.max_attendees,
    ev.is_virtual,
    ev.virtual_link,
    ev.tags,
    ev.image_url,
    ev.is_active,
    CASE
        WHEN ev.registration_deadline IS NULL THEN NULL
        ELSE to_char(ev.registration_deadline AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
    END AS registration_deadline,
    to_char(ev.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(ev.updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at,
    o.id AS organizer_id,
    o.first_name AS organizer_first_name,
    o.last_name AS organizer_last_name,
    o.email AS organizer_email,
    o.role AS organizer_role,
    (SELECT count(*) FROM event_attendees a
      WHERE a.event_id = ev.id AND a.status = 'registered') AS attendee_count,
    (ev.is_active
      AND NOW() < COALESCE(ev.registration_deadline, ev.event_date)
      AND (ev.max_attendees IS NULL
           OR (SELECT count(*) FROM event_attendees a
                WHERE a.event_id = ev.id AND a.status = 'registered') < ev.max_attendees)
    ) AS is_registration_open
"#;

const EVENT_FROM: &str = r"
    FROM events ev
    JOIN users o ON o.id = ev.organizer_id
";

#[derive(Debug, Clone)]
pub struct UserRef {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: Uuid,
    pub organizer: UserRef,
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub event_time: String,
    pub location: String,
    pub event_type: String,
    pub max_attendees: Option<i32>,
    pub is_virtual: bool,
    pub virtual_link: Option<String>,
    pub attendee_count: i64,
    pub is_registration_open: bool,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub registration_deadline: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct AttendeeRecord {
    pub user: UserRef,
    pub status: String,
    pub registered_at: String,
}

#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub id: Uuid,
    pub user: UserRef,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct NewEvent {
    pub organizer_id: Uuid,
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub event_time: String,
    pub location: String,
    pub event_type: String,
    pub max_attendees: Option<i32>,
    pub is_virtual: bool,
    pub virtual_link: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub registration_deadline: Option<String>,
}

/// `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<String>,
    pub event_time: Option<String>,
    pub location: Option<String>,
    pub event_type: Option<String>,
    pub max_attendees: Option<i32>,
    pub is_virtual: Option<bool>,
    pub virtual_link: Option<String>,
    pub tags: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub registration_deadline: Option<String>,
}

#[derive(Debug, Default)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub upcoming: bool,
    pub search: Option<String>,
}

/// RSVP outcome from the guarded transaction.
#[derive(Debug, PartialEq, Eq)]
pub enum RsvpOutcome {
    Registered,
    AlreadyRegistered,
    RegistrationClosed,
    EventFull,
    NotFound,
}

fn event_from_row(row: &PgRow) -> EventRecord {
    EventRecord {
        id: row.get("id"),
        organizer: UserRef {
            id: row.get("organizer_id"),
            first_name: row.get("organizer_first_name"),
            last_name: row.get("organizer_last_name"),
            email: row.get("organizer_email"),
            role: row.get("organizer_role"),
        },
        title: row.get("title"),
        description: row.get("description"),
        event_date: row.get("event_date"),
        event_time: row.get("event_time"),
        location: row.get("location"),
        event_type: row.get("event_type"),
        max_attendees: row.get("max_attendees"),
        is_virtual: row.get("is_virtual"),
        virtual_link: row.get("virtual_link"),
        attendee_count: row.get("attendee_count"),
        is_registration_open: row.get("is_registration_open"),
        tags: row.get("tags"),
        image_url: row.get("image_url"),
        is_active: row.get("is_active"),
        registration_deadline: row.get("registration_deadline"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn fetch_event(pool: &PgPool, event_id: Uuid) -> Result<Option<EventRecord>> {
    let query = format!("SELECT {EVENT_COLUMNS} {EVENT_FROM} WHERE ev.id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(event_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch event")?;

    Ok(row.map(|row| event_from_row(&row)))
}

fn push_event_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &EventFilter) {
    if let Some(event_type) = &filter.event_type {
        builder.push(" AND ev.event_type = ");
        builder.push_bind(event_type.clone());
    }
    if let Some(from_date) = &filter.from_date {
        builder.push(" AND ev.event_date >= ");
        builder.push_bind(from_date.clone());
        builder.push("::timestamptz");
    }
    if let Some(to_date) = &filter.to_date {
        builder.push(" AND ev.event_date <= ");
        builder.push_bind(to_date.clone());
        builder.push("::timestamptz");
    }
    if filter.upcoming {
        builder.push(" AND ev.event_date >= NOW()");
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        builder.push(" AND (ev.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR ev.description ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR ev.location ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR EXISTS (SELECT 1 FROM unnest(ev.tags) AS tag WHERE tag ILIKE ");
        builder.push_bind(pattern);
        builder.push("))");
    }
}

/// Active events, soonest first for upcoming listings, latest first otherwise.
pub async fn list_events(
    pool: &PgPool,
    filter: &EventFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<EventRecord>, i64)> {
    let mut count_builder = QueryBuilder::new(format!(
        "SELECT count(*) {EVENT_FROM} WHERE ev.is_active = TRUE"
    ));
    push_event_filters(&mut count_builder, filter);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .context("failed to count events")?;

    let mut builder = QueryBuilder::new(format!(
        "SELECT {EVENT_COLUMNS} {EVENT_FROM} WHERE ev.is_active = TRUE"
    ));
    push_event_filters(&mut builder, filter);
    builder.push(if filter.upcoming {
        " ORDER BY ev.event_date ASC LIMIT "
    } else {
        " ORDER BY ev.event_date DESC LIMIT "
    });
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows = builder
        .build()
        .fetch_all(pool)
        .await
        .context("failed to list events")?;

    Ok((rows.iter().map(event_from_row).collect(), total))
}

pub async fn insert_event(pool: &PgPool, event: NewEvent) -> Result<Uuid, sqlx::Error> {
    let query = r"
        INSERT INTO events
            (organizer_id, title, description, event_date, event_time, location,
             event_type, max_attendees, is_virtual, virtual_link, tags, image_url,
             registration_deadline)
        VALUES ($1, $2, $3, $4::timestamptz, $5, $6, $7, $8, $9, $10, $11, $12,
                $13::timestamptz)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(event.organizer_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.event_date)
        .bind(&event.event_time)
        .bind(&event.location)
        .bind(&event.event_type)
        .bind(event.max_attendees)
        .bind(event.is_virtual)
        .bind(&event.virtual_link)
        .bind(&event.tags)
        .bind(&event.image_url)
        .bind(&event.registration_deadline)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(row.get("id"))
}

/// Apply partial changes; the caller has already checked ownership.
pub async fn update_event(
    pool: &PgPool,
    event_id: Uuid,
    changes: EventChanges,
) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE events
        SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            event_date = COALESCE($3::timestamptz, event_date),
            event_time = COALESCE($4, event_time),
            location = COALESCE($5, location),
            event_type = COALESCE($6, event_type),
            max_attendees = COALESCE($7, max_attendees),
            is_virtual = COALESCE($8, is_virtual),
            virtual_link = COALESCE($9, virtual_link),
            tags = COALESCE($10, tags),
            image_url = COALESCE($11, image_url),
            registration_deadline = COALESCE($12::timestamptz, registration_deadline),
            updated_at = NOW()
        WHERE id = $13
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.event_date)
        .bind(&changes.event_time)
        .bind(&changes.location)
        .bind(&changes.event_type)
        .bind(changes.max_attendees)
        .bind(changes.is_virtual)
        .bind(&changes.virtual_link)
        .bind(&changes.tags)
        .bind(&changes.image_url)
        .bind(&changes.registration_deadline)
        .bind(event_id)
        .execute(pool)
        .instrument(span)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft delete; the row stays referenceable for history.
pub async fn deactivate_event(pool: &PgPool, event_id: Uuid) -> Result<bool> {
    let query = "UPDATE events SET is_active = FALSE, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(event_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to deactivate event")?;

    Ok(result.rows_affected() > 0)
}

/// Register an attendee with the event row locked for the capacity check.
pub async fn register_attendee(
    pool: &PgPool,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<RsvpOutcome> {
    let mut tx = pool.begin().await.context("begin rsvp transaction")?;

    let event = sqlx::query(
        r"
        SELECT is_active, max_attendees,
               NOW() < COALESCE(registration_deadline, event_date) AS before_deadline
        FROM events
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to lock event row")?;

    let Some(event) = event else {
        return Ok(RsvpOutcome::NotFound);
    };

    let is_active: bool = event.get("is_active");
    let before_deadline: bool = event.get("before_deadline");
    if !is_active || !before_deadline {
        return Ok(RsvpOutcome::RegistrationClosed);
    }

    let registered: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM event_attendees WHERE event_id = $1 AND status = 'registered'",
    )
    .bind(event_id)
    .fetch_one(&mut *tx)
    .await
    .context("failed to count attendees")?;

    let max_attendees: Option<i32> = event.get("max_attendees");
    if max_attendees.is_some_and(|max| registered >= i64::from(max)) {
        return Ok(RsvpOutcome::EventFull);
    }

    let inserted = sqlx::query(
        r"
        INSERT INTO event_attendees (event_id, user_id, status)
        VALUES ($1, $2, 'registered')
        ",
    )
    .bind(event_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(_) => {}
        Err(err) if is_unique_violation(&err) => {
            return Ok(RsvpOutcome::AlreadyRegistered);
        }
        Err(err) => return Err(err).context("failed to insert attendee"),
    }

    tx.commit().await.context("commit rsvp transaction")?;
    Ok(RsvpOutcome::Registered)
}

/// Remove an RSVP. Returns false when the caller was not registered.
pub async fn remove_attendee(pool: &PgPool, event_id: Uuid, user_id: Uuid) -> Result<bool> {
    let query = "DELETE FROM event_attendees WHERE event_id = $1 AND user_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(event_id)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to remove attendee")?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_attendees(pool: &PgPool, event_id: Uuid) -> Result<Vec<AttendeeRecord>> {
    let query = r#"
        SELECT
            a.status,
            to_char(a.registered_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS registered_at,
            u.id AS user_id,
            u.first_name,
            u.last_name,
            u.email,
            u.role
        FROM event_attendees a
        JOIN users u ON u.id = a.user_id
        WHERE a.event_id = $1
        ORDER BY a.registered_at
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(event_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to fetch attendees")?;

    Ok(rows
        .into_iter()
        .map(|row| AttendeeRecord {
            user: UserRef {
                id: row.get("user_id"),
                first_name: row.get("first_name"),
                last_name: row.get("last_name"),
                email: row.get("email"),
                role: row.get("role"),
            },
            status: row.get("status"),
            registered_at: row.get("registered_at"),
        })
        .collect())
}

/// Append an immutable comment and return it with its author resolved.
pub async fn insert_comment(
    pool: &PgPool,
    event_id: Uuid,
    user_id: Uuid,
    comment: &str,
) -> Result<CommentRecord> {
    let query = r#"
        WITH inserted AS (
            INSERT INTO event_comments (event_id, user_id, comment)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, comment, created_at
        )
        SELECT
            inserted.id,
            inserted.comment,
            to_char(inserted.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            u.id AS user_id,
            u.first_name,
            u.last_name,
            u.email,
            u.role
        FROM inserted
        JOIN users u ON u.id = inserted.user_id
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(event_id)
        .bind(user_id)
        .bind(comment)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to append comment")?;

    Ok(CommentRecord {
        id: row.get("id"),
        user: UserRef {
            id: row.get("user_id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            role: row.get("role"),
        },
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    })
}

pub async fn fetch_comments(pool: &PgPool, event_id: Uuid) -> Result<Vec<CommentRecord>> {
    let query = r#"
        SELECT
            c.id,
            c.comment,
            to_char(c.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            u.id AS user_id,
            u.first_name,
            u.last_name,
            u.email,
            u.role
        FROM event_comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.event_id = $1
        ORDER BY c.created_at, c.id
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(event_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to fetch comments")?;

    Ok(rows
        .into_iter()
        .map(|row| CommentRecord {
            id: row.get("id"),
            user: UserRef {
                id: row.get("user_id"),
                first_name: row.get("first_name"),
                last_name: row.get("last_name"),
                email: row.get("email"),
                role: row.get("role"),
            },
            comment: row.get("comment"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// Probe whether a timestamp literal parses and lies in the future.
/// `Ok(None)` means the literal did not parse as a timestamp.
pub async fn timestamp_in_future(pool: &PgPool, value: &str) -> Result<Option<bool>> {
    let result = sqlx::query_scalar::<_, bool>("SELECT $1::timestamptz > NOW()")
        .bind(value)
        .fetch_one(pool)
        .await;

    match result {
        Ok(future) => Ok(Some(future)),
        Err(err) if crate::api::error::is_datetime_error(&err) => Ok(None),
        Err(err) => Err(err).context("failed to probe timestamp"),
    }
}
