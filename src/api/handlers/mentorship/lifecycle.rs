//! Mentorship request lifecycle.
//!
//! Pure transition rules, kept separate from storage so every guard is
//! testable without a database. The storage layer applies the outcome with
//! conditional `UPDATE ... WHERE status = ...` statements, so a stale read
//! can never commit an invalid transition.
//!
//! Valid transitions: `pending -> accepted | declined`, `accepted ->
//! completed`. `declined`, `completed` and `cancelled` are terminal.
//! `cancelled` exists in the schema but no endpoint currently triggers it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Declined | Self::Completed | Self::Cancelled)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(UnknownStatus),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown request status")]
pub struct UnknownStatus;

/// Mentor decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Declined,
}

impl Decision {
    #[must_use]
    pub const fn into_status(self) -> RequestStatus {
        match self {
            Self::Accepted => RequestStatus::Accepted,
            Self::Declined => RequestStatus::Declined,
        }
    }
}

/// Which side of the request the acting account is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Mentor,
    Mentee,
}

/// The two accounts bound to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parties {
    pub mentor: Uuid,
    pub mentee: Uuid,
}

impl Parties {
    /// Resolve the acting account to its side, or `None` for outsiders.
    #[must_use]
    pub fn party_of(&self, account: Uuid) -> Option<Party> {
        if account == self.mentor {
            Some(Party::Mentor)
        } else if account == self.mentee {
            Some(Party::Mentee)
        } else {
            None
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("request has already been responded to (status: {status})")]
    AlreadyResolved { status: RequestStatus },
    #[error("request is not accepted (status: {status})")]
    NotAccepted { status: RequestStatus },
    #[error("rating is not open in this state (status: {status})")]
    RatingClosed { status: RequestStatus },
}

/// Guard for `pending -> accepted | declined`.
///
/// # Errors
///
/// Fails with [`LifecycleError::AlreadyResolved`] unless the request is
/// still pending. `responded_at` is therefore set at most once: the only
/// write to it rides on this transition.
pub fn ensure_respondable(current: RequestStatus) -> Result<(), LifecycleError> {
    if current == RequestStatus::Pending {
        Ok(())
    } else {
        Err(LifecycleError::AlreadyResolved { status: current })
    }
}

/// Meetings can only be (re)scheduled on an accepted request.
///
/// # Errors
///
/// Fails with [`LifecycleError::NotAccepted`] for every other state.
pub fn ensure_schedulable(current: RequestStatus) -> Result<(), LifecycleError> {
    if current == RequestStatus::Accepted {
        Ok(())
    } else {
        Err(LifecycleError::NotAccepted { status: current })
    }
}

/// Ratings are accepted while the request is accepted, and may still be
/// overwritten after completion. Per-party writes are idempotent.
///
/// # Errors
///
/// Fails with [`LifecycleError::RatingClosed`] in pending and terminal
/// non-completed states.
pub fn ensure_ratable(current: RequestStatus) -> Result<(), LifecycleError> {
    match current {
        RequestStatus::Accepted | RequestStatus::Completed => Ok(()),
        status => Err(LifecycleError::RatingClosed { status }),
    }
}

/// Status after a rating write: completed exactly when both halves exist.
/// Completion is one-way; an overwrite never reopens the request.
#[must_use]
pub fn completion(
    current: RequestStatus,
    mentor_rating: Option<i16>,
    mentee_rating: Option<i16>,
) -> RequestStatus {
    match current {
        RequestStatus::Accepted if mentor_rating.is_some() && mentee_rating.is_some() => {
            RequestStatus::Completed
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MENTOR: Uuid = Uuid::from_u128(1);
    const MENTEE: Uuid = Uuid::from_u128(2);
    const OUTSIDER: Uuid = Uuid::from_u128(3);

    fn parties() -> Parties {
        Parties {
            mentor: MENTOR,
            mentee: MENTEE,
        }
    }

    #[test]
    fn respond_only_from_pending() {
        assert_eq!(ensure_respondable(RequestStatus::Pending), Ok(()));
        for status in [
            RequestStatus::Accepted,
            RequestStatus::Declined,
            RequestStatus::Completed,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(
                ensure_respondable(status),
                Err(LifecycleError::AlreadyResolved { status })
            );
        }
    }

    #[test]
    fn schedule_only_when_accepted() {
        assert_eq!(ensure_schedulable(RequestStatus::Accepted), Ok(()));
        for status in [
            RequestStatus::Pending,
            RequestStatus::Declined,
            RequestStatus::Completed,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(
                ensure_schedulable(status),
                Err(LifecycleError::NotAccepted { status })
            );
        }
    }

    #[test]
    fn rating_open_in_accepted_and_completed() {
        assert_eq!(ensure_ratable(RequestStatus::Accepted), Ok(()));
        assert_eq!(ensure_ratable(RequestStatus::Completed), Ok(()));
        for status in [
            RequestStatus::Pending,
            RequestStatus::Declined,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(
                ensure_ratable(status),
                Err(LifecycleError::RatingClosed { status })
            );
        }
    }

    #[test]
    fn completion_requires_both_ratings() {
        assert_eq!(
            completion(RequestStatus::Accepted, None, None),
            RequestStatus::Accepted
        );
        assert_eq!(
            completion(RequestStatus::Accepted, Some(5), None),
            RequestStatus::Accepted
        );
        assert_eq!(
            completion(RequestStatus::Accepted, None, Some(4)),
            RequestStatus::Accepted
        );
        assert_eq!(
            completion(RequestStatus::Accepted, Some(5), Some(4)),
            RequestStatus::Completed
        );
    }

    #[test]
    fn completion_is_one_way() {
        // An overwrite after completion keeps the terminal status.
        assert_eq!(
            completion(RequestStatus::Completed, Some(3), Some(4)),
            RequestStatus::Completed
        );
        // Missing halves never un-complete a request either.
        assert_eq!(
            completion(RequestStatus::Completed, Some(3), None),
            RequestStatus::Completed
        );
    }

    #[test]
    fn decision_maps_to_status() {
        assert_eq!(Decision::Accepted.into_status(), RequestStatus::Accepted);
        assert_eq!(Decision::Declined.into_status(), RequestStatus::Declined);
    }

    #[test]
    fn party_resolution() {
        assert_eq!(parties().party_of(MENTOR), Some(Party::Mentor));
        assert_eq!(parties().party_of(MENTEE), Some(Party::Mentee));
        assert_eq!(parties().party_of(OUTSIDER), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::Accepted.is_terminal());
        assert!(RequestStatus::Declined.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_round_trips_through_strings() -> Result<(), UnknownStatus> {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Declined,
            RequestStatus::Completed,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>()?, status);
        }
        assert!("resolved".parse::<RequestStatus>().is_err());
        Ok(())
    }
}
