//! # Alumnet (Alumni Network Management API)
//!
//! `alumnet` is the backend for an alumni-management system: accounts with
//! role-based access (admin, alumni, student), an alumni directory, events
//! with RSVPs and comments, and a mentorship-request workflow.
//!
//! ## Authentication & Authorization
//!
//! Login issues an RS256-signed, time-limited identity token. The
//! authorization guard verifies it on every protected request, resolves the
//! subject to an account, and rejects deactivated accounts; role and
//! ownership checks run in the services on the attached principal.
//!
//! ## Mentorship Lifecycle
//!
//! Requests move along `pending -> accepted | declined` and
//! `accepted -> completed`, the latter once both parties have rated.
//! Transitions are applied as conditional single-row updates, so concurrent
//! calls cannot double-apply a transition.
//!
//! ## Soft Deletes
//!
//! Accounts and events are deactivated rather than removed; historical
//! references (organizers, note authors) stay resolvable.

pub mod api;
pub mod cli;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
