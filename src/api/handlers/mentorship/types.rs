//! Request/response types for mentorship endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::lifecycle::{Decision, RequestStatus};
use super::storage::{NoteRecord, PartyRecord, RequestRecord};

/// Mentorship areas accepted on request creation.
pub const MENTORSHIP_AREAS: &[&str] = &[
    "career-guidance",
    "technical-skills",
    "entrepreneurship",
    "interview-preparation",
    "networking",
    "industry-insights",
    "personal-development",
    "academic-guidance",
    "other",
];

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartySummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<PartyRecord> for PartySummary {
    fn from(record: PartyRecord) -> Self {
        Self {
            id: record.id.to_string(),
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMeetingBody {
    pub date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_rating: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentee_rating: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentee_feedback: Option<String>,
}

impl RatingBody {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mentor_rating.is_none()
            && self.mentor_feedback.is_none()
            && self.mentee_rating.is_none()
            && self.mentee_feedback.is_none()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteBody {
    pub id: String,
    pub note: String,
    pub added_by: PartySummary,
    pub added_at: String,
}

impl From<NoteRecord> for NoteBody {
    fn from(record: NoteRecord) -> Self {
        Self {
            id: record.id.to_string(),
            note: record.note,
            added_by: record.author.into(),
            added_at: record.added_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub id: String,
    pub mentor: PartySummary,
    pub mentee: PartySummary,
    pub subject: String,
    pub message: String,
    pub mentorship_area: String,
    pub status: RequestStatus,
    pub requested_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_meeting: Option<ScheduledMeetingBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_notes: Option<Vec<NoteBody>>,
    pub tags: Vec<String>,
}

impl RequestBody {
    #[must_use]
    pub fn from_record(record: RequestRecord, notes: Option<Vec<NoteRecord>>) -> Self {
        let scheduled_meeting = record.meeting_at.map(|date_time| ScheduledMeetingBody {
            date_time,
            meeting_link: record.meeting_link,
            location: record.meeting_location,
            agenda: record.meeting_agenda,
        });
        let rating = RatingBody {
            mentor_rating: record.mentor_rating,
            mentor_feedback: record.mentor_feedback,
            mentee_rating: record.mentee_rating,
            mentee_feedback: record.mentee_feedback,
        };
        Self {
            id: record.id.to_string(),
            mentor: record.mentor.into(),
            mentee: record.mentee.into(),
            subject: record.subject,
            message: record.message,
            mentorship_area: record.mentorship_area,
            status: record.status,
            requested_at: record.requested_at,
            responded_at: record.responded_at,
            mentor_response: record.mentor_response,
            scheduled_meeting,
            rating: (!rating.is_empty()).then_some(rating),
            follow_up_notes: notes.map(|notes| notes.into_iter().map(NoteBody::from).collect()),
            tags: record.tags,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRequest {
    /// Mentor account id.
    pub mentor: String,
    pub subject: String,
    pub message: String,
    pub mentorship_area: String,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RespondRequest {
    pub status: Decision,
    pub mentor_response: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleRequest {
    pub date_time: String,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub agenda: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompleteRequest {
    pub rating: i16,
    pub feedback: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RequestListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Side of the request to list: `mentor` or `mentee`.
    pub role: Option<String>,
    pub status: Option<RequestStatus>,
    pub area: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub request: RequestBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestListResponse {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub requests: Vec<RequestBody>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NoteResponse {
    pub success: bool,
    pub message: String,
    pub note: NoteBody,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub success: bool,
    pub message: String,
    pub scheduled_meeting: ScheduledMeetingBody,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AreaCount {
    pub mentorship_area: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AverageRatings {
    pub avg_mentor_rating: f64,
    pub avg_mentee_rating: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MentorshipStats {
    pub total_requests: i64,
    pub pending_requests: i64,
    pub accepted_requests: i64,
    pub completed_requests: i64,
    pub requests_by_area: Vec<AreaCount>,
    pub average_ratings: AverageRatings,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MentorshipStatsResponse {
    pub success: bool,
    pub stats: MentorshipStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use uuid::Uuid;

    fn party(id: u128, name: &str) -> PartyRecord {
        PartyRecord {
            id: Uuid::from_u128(id),
            first_name: name.to_string(),
            last_name: "Example".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    fn record() -> RequestRecord {
        RequestRecord {
            id: Uuid::from_u128(99),
            mentor: party(1, "Mentor"),
            mentee: party(2, "Mentee"),
            subject: "Career advice".to_string(),
            message: "Looking for guidance".to_string(),
            mentorship_area: "career-guidance".to_string(),
            status: RequestStatus::Pending,
            requested_at: "2024-03-01T10:00:00Z".to_string(),
            responded_at: None,
            mentor_response: None,
            meeting_at: None,
            meeting_link: None,
            meeting_location: None,
            meeting_agenda: None,
            mentor_rating: None,
            mentor_feedback: None,
            mentee_rating: None,
            mentee_feedback: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn pending_request_serializes_without_optional_blocks() -> Result<()> {
        let body = RequestBody::from_record(record(), None);
        let value = serde_json::to_value(&body)?;
        assert_eq!(value["status"], "pending");
        assert_eq!(value["mentorshipArea"], "career-guidance");
        assert!(value.get("respondedAt").is_none());
        assert!(value.get("scheduledMeeting").is_none());
        assert!(value.get("rating").is_none());
        Ok(())
    }

    #[test]
    fn rating_block_appears_once_any_half_exists() -> Result<()> {
        let mut rec = record();
        rec.status = RequestStatus::Accepted;
        rec.mentor_rating = Some(5);
        let body = RequestBody::from_record(rec, None);
        let value = serde_json::to_value(&body)?;
        assert_eq!(value["rating"]["mentorRating"], 5);
        assert!(value["rating"].get("menteeRating").is_none());
        Ok(())
    }

    #[test]
    fn notes_serialize_in_given_order() -> Result<()> {
        let notes = vec![
            NoteRecord {
                id: Uuid::from_u128(10),
                note: "first".to_string(),
                author: party(1, "Mentor"),
                added_at: "2024-03-02T10:00:00Z".to_string(),
            },
            NoteRecord {
                id: Uuid::from_u128(11),
                note: "second".to_string(),
                author: party(2, "Mentee"),
                added_at: "2024-03-03T10:00:00Z".to_string(),
            },
        ];
        let body = RequestBody::from_record(record(), Some(notes));
        let value = serde_json::to_value(&body)?;
        assert_eq!(value["followUpNotes"][0]["note"], "first");
        assert_eq!(value["followUpNotes"][1]["note"], "second");
        Ok(())
    }

    #[test]
    fn respond_request_parses_decision() -> Result<()> {
        let request: RespondRequest = serde_json::from_value(serde_json::json!({
            "status": "declined",
            "mentorResponse": "busy"
        }))?;
        assert_eq!(request.status, Decision::Declined);
        assert_eq!(request.mentor_response.as_deref(), Some("busy"));
        Ok(())
    }

    #[test]
    fn respond_request_rejects_non_decision_status() {
        let result: std::result::Result<RespondRequest, _> =
            serde_json::from_value(serde_json::json!({ "status": "completed" }));
        assert!(result.is_err());
    }
}
