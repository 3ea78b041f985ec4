//! `OpenAPI` router wiring and route registration.

use axum::middleware;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::handlers::{auth, events, health, mentorship, users};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Everything except health,
/// register, and login sits behind the authentication guard.
pub(crate) fn api_router() -> OpenApiRouter {
    let public = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::login::login));

    let protected = OpenApiRouter::new()
        .routes(routes!(auth::profile::me))
        .routes(routes!(auth::profile::update_own_profile))
        .routes(routes!(auth::profile::change_password))
        .routes(routes!(users::list_users))
        .routes(routes!(users::list_mentors))
        .routes(routes!(users::user_stats))
        .routes(routes!(users::get_user, users::update_user, users::delete_user))
        .routes(routes!(events::list_events, events::create_event))
        .routes(routes!(events::event_stats))
        .routes(routes!(events::get_event, events::update_event, events::delete_event))
        .routes(routes!(events::rsvp_event, events::cancel_rsvp))
        .routes(routes!(events::add_comment))
        .routes(routes!(mentorship::list_requests, mentorship::create_request))
        .routes(routes!(mentorship::mentorship_stats))
        .routes(routes!(mentorship::get_request))
        .routes(routes!(mentorship::respond_to_request))
        .routes(routes!(mentorship::schedule_meeting))
        .routes(routes!(mentorship::add_note))
        .routes(routes!(mentorship::complete_request))
        // Every route above requires a resolved principal.
        .layer(middleware::from_fn(auth::principal::authenticate));

    public.merge(protected)
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Registration, login, and account self-service".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Alumni directory".to_string());

    let mut events_tag = Tag::new("events");
    events_tag.description = Some("Events, RSVPs, and comments".to_string());

    let mut mentorship_tag = Tag::new("mentorship");
    mentorship_tag.description = Some("Mentorship request lifecycle".to_string());

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(vec![auth_tag, users_tag, events_tag, mentorship_tag]))
        .build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );
    }

    #[test]
    fn openapi_documents_core_paths() {
        let spec = openapi();
        let paths = &spec.paths.paths;
        for path in [
            "/api/health",
            "/api/auth/register",
            "/api/auth/login",
            "/api/auth/me",
            "/api/users",
            "/api/users/{id}",
            "/api/events",
            "/api/events/{id}/rsvp",
            "/api/mentorship",
            "/api/mentorship/{id}/respond",
            "/api/mentorship/{id}/complete",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Jane Doe <jane@example.com>"),
            (Some("Jane Doe"), Some("jane@example.com"))
        );
        assert_eq!(parse_author("Jane Doe"), (Some("Jane Doe"), None));
        assert_eq!(parse_author("<jane@example.com>"), (None, Some("jane@example.com")));
    }
}
