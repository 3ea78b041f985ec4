//! API handlers and shared validation helpers.

pub mod auth;
pub mod events;
pub mod health;
pub mod mentorship;
pub mod users;

use regex::Regex;

pub const GRADUATION_YEAR_MIN: i32 = 1950;
pub const GRADUATION_YEAR_MAX: i32 = 2100;

/// Normalize an email for lookup/uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Passwords need length plus upper/lower/digit variety.
pub fn valid_password(password: &str) -> bool {
    password.len() >= 6
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

pub fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^\+?[\d\s()-]+$").is_ok_and(|re| re.is_match(phone))
}

pub fn valid_linkedin_url(url: &str) -> bool {
    Regex::new(r"^https?://(www\.)?linkedin\.com/in/[\w-]+/?$").is_ok_and(|re| re.is_match(url))
}

pub fn valid_graduation_year(year: i32) -> bool {
    (GRADUATION_YEAR_MIN..=GRADUATION_YEAR_MAX).contains(&year)
}

/// Shallow date/timestamp shape check; Postgres does the strict parse.
pub fn valid_timestamp(value: &str) -> bool {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2})?(\.\d+)?(Z|[+-]\d{2}:?\d{2})?)?$",
    )
    .is_ok_and(|re| re.is_match(value))
}

/// Event times are wall-clock HH:MM strings.
pub fn valid_event_time(value: &str) -> bool {
    Regex::new(r"^([0-1]?\d|2[0-3]):[0-5]\d$").is_ok_and(|re| re.is_match(value))
}

/// Trim an optional string field, collapsing blanks to `None`.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn valid_password_requires_variety() {
        assert!(valid_password("Passw0rd"));
        assert!(!valid_password("Ab1"));
        assert!(!valid_password("alllowercase1"));
        assert!(!valid_password("ALLUPPERCASE1"));
        assert!(!valid_password("NoDigitsHere"));
    }

    #[test]
    fn valid_phone_accepts_common_formats() {
        assert!(valid_phone("+1 (555) 123-4567"));
        assert!(valid_phone("555 123 4567"));
        assert!(!valid_phone("call me"));
    }

    #[test]
    fn valid_linkedin_url_checks_shape() {
        assert!(valid_linkedin_url("https://www.linkedin.com/in/grace-hopper"));
        assert!(valid_linkedin_url("http://linkedin.com/in/ada_lovelace/"));
        assert!(!valid_linkedin_url("https://example.com/in/grace"));
    }

    #[test]
    fn graduation_year_bounds() {
        assert!(valid_graduation_year(1950));
        assert!(valid_graduation_year(2024));
        assert!(!valid_graduation_year(1949));
        assert!(!valid_graduation_year(2101));
    }

    #[test]
    fn timestamp_shapes() {
        assert!(valid_timestamp("2024-06-01T15:30:00Z"));
        assert!(valid_timestamp("2024-06-01 15:30"));
        assert!(valid_timestamp("2024-06-01T15:30:00+02:00"));
        assert!(valid_timestamp("2024-06-01"));
        assert!(!valid_timestamp("June 1st"));
        assert!(!valid_timestamp("2024-6-1"));
    }

    #[test]
    fn event_time_shapes() {
        assert!(valid_event_time("09:30"));
        assert!(valid_event_time("9:30"));
        assert!(valid_event_time("23:59"));
        assert!(!valid_event_time("24:00"));
        assert!(!valid_event_time("12:60"));
        assert!(!valid_event_time("noon"));
    }

    #[test]
    fn normalize_optional_collapses_blanks() {
        assert_eq!(normalize_optional(Some("  ".to_string())), None);
        assert_eq!(
            normalize_optional(Some(" x ".to_string())),
            Some("x".to_string())
        );
        assert_eq!(normalize_optional(None), None);
    }
}
