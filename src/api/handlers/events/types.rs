//! Request/response types for event endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::storage::{AttendeeRecord, CommentRecord, EventRecord, UserRef};

/// Event types accepted on create/update.
pub const EVENT_TYPES: &[&str] = &[
    "networking",
    "seminar",
    "workshop",
    "reunion",
    "career-fair",
    "social",
    "other",
];

pub const MAX_ATTENDEE_LIMIT: i32 = 10_000;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl From<UserRef> for UserSummary {
    fn from(user: UserRef) -> Self {
        Self {
            id: user.id.to_string(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeBody {
    pub user: UserSummary,
    pub status: String,
    pub registered_at: String,
}

impl From<AttendeeRecord> for AttendeeBody {
    fn from(record: AttendeeRecord) -> Self {
        Self {
            user: record.user.into(),
            status: record.status,
            registered_at: record.registered_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    pub id: String,
    pub user: UserSummary,
    pub comment: String,
    pub created_at: String,
}

impl From<CommentRecord> for CommentBody {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id.to_string(),
            user: record.user.into(),
            comment: record.comment,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    pub id: String,
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub event_time: String,
    pub location: String,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<i32>,
    pub is_virtual: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_link: Option<String>,
    pub organizer: UserSummary,
    pub attendee_count: i64,
    pub is_registration_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<AttendeeBody>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentBody>>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_deadline: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl EventBody {
    #[must_use]
    pub fn from_record(
        record: EventRecord,
        attendees: Option<Vec<AttendeeRecord>>,
        comments: Option<Vec<CommentRecord>>,
    ) -> Self {
        Self {
            id: record.id.to_string(),
            title: record.title,
            description: record.description,
            event_date: record.event_date,
            event_time: record.event_time,
            location: record.location,
            event_type: record.event_type,
            max_attendees: record.max_attendees,
            is_virtual: record.is_virtual,
            virtual_link: record.virtual_link,
            organizer: record.organizer.into(),
            attendee_count: record.attendee_count,
            is_registration_open: record.is_registration_open,
            attendees: attendees.map(|list| list.into_iter().map(AttendeeBody::from).collect()),
            comments: comments.map(|list| list.into_iter().map(CommentBody::from).collect()),
            tags: record.tags,
            image_url: record.image_url,
            is_active: record.is_active,
            registration_deadline: record.registration_deadline,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub event_time: String,
    pub location: String,
    pub event_type: String,
    pub max_attendees: Option<i32>,
    pub is_virtual: Option<bool>,
    pub virtual_link: Option<String>,
    pub tags: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub registration_deadline: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateEventRequest {
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

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub comment: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EventListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub event_type: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    /// Defaults to true: only future events, soonest first.
    pub upcoming: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub event: EventBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventListResponse {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub events: Vec<EventBody>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventCommentResponse {
    pub success: bool,
    pub message: String,
    pub comment: CommentBody,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypeCount {
    pub event_type: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub total_events: i64,
    pub upcoming_events: i64,
    pub events_by_type: Vec<TypeCount>,
    pub total_attendees: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventStatsResponse {
    pub success: bool,
    pub stats: EventStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use uuid::Uuid;

    fn record() -> EventRecord {
        EventRecord {
            id: Uuid::from_u128(5),
            organizer: UserRef {
                id: Uuid::from_u128(1),
                first_name: "Olive".to_string(),
                last_name: "Organizer".to_string(),
                email: "olive@example.com".to_string(),
                role: Some("alumni".to_string()),
            },
            title: "Spring Reunion".to_string(),
            description: "Annual gathering".to_string(),
            event_date: "2030-05-01T18:00:00Z".to_string(),
            event_time: "18:00".to_string(),
            location: "Main Hall".to_string(),
            event_type: "reunion".to_string(),
            max_attendees: Some(100),
            is_virtual: false,
            virtual_link: None,
            attendee_count: 3,
            is_registration_open: true,
            tags: vec!["alumni".to_string()],
            image_url: None,
            is_active: true,
            registration_deadline: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn event_body_uses_camel_case_and_computed_fields() -> Result<()> {
        let body = EventBody::from_record(record(), None, None);
        let value = serde_json::to_value(&body)?;
        assert_eq!(value["eventType"], "reunion");
        assert_eq!(value["attendeeCount"], 3);
        assert_eq!(value["isRegistrationOpen"], true);
        assert_eq!(value["organizer"]["firstName"], "Olive");
        assert!(value.get("attendees").is_none());
        Ok(())
    }

    #[test]
    fn attendees_appear_when_loaded() -> Result<()> {
        let attendees = vec![AttendeeRecord {
            user: UserRef {
                id: Uuid::from_u128(9),
                first_name: "Rae".to_string(),
                last_name: "Rsvp".to_string(),
                email: "rae@example.com".to_string(),
                role: Some("student".to_string()),
            },
            status: "registered".to_string(),
            registered_at: "2024-02-01T00:00:00Z".to_string(),
        }];
        let body = EventBody::from_record(record(), Some(attendees), None);
        let value = serde_json::to_value(&body)?;
        assert_eq!(value["attendees"][0]["status"], "registered");
        assert_eq!(value["attendees"][0]["user"]["firstName"], "Rae");
        Ok(())
    }

    #[test]
    fn create_request_accepts_camel_case() -> Result<()> {
        let request: CreateEventRequest = serde_json::from_value(serde_json::json!({
            "title": "Career Fair",
            "description": "Meet employers",
            "eventDate": "2030-09-01T09:00:00Z",
            "eventTime": "09:00",
            "location": "Campus Center",
            "eventType": "career-fair",
            "maxAttendees": 250
        }))?;
        assert_eq!(request.event_type, "career-fair");
        assert_eq!(request.max_attendees, Some(250));
        Ok(())
    }
}
