use super::handlers::{
    carers, health, patients, shifts, user, user_login, user_register, user_verification,
};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Served routes and the `OpenAPI` document come from the same registration.
///
/// Handlers sharing a path shape go in one `routes!` and must agree on the
/// path parameter name.
pub(crate) fn api_router() -> OpenApiRouter {
    OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(user_register::register))
        .routes(routes!(user_login::login))
        .routes(routes!(user_login::logout))
        .routes(routes!(user_verification::verify_email))
        .routes(routes!(user_verification::resend_verification))
        .routes(routes!(user::current_user))
        .routes(routes!(patients::list_patients, patients::create_patient))
        .routes(routes!(
            patients::get_patient,
            patients::update_patient_handler,
            patients::delete_patient_handler
        ))
        .routes(routes!(carers::invite_carer))
        .routes(routes!(carers::redeem_invite))
        .routes(routes!(carers::remove_carer_handler))
        .routes(routes!(shifts::list_shifts))
        .routes(routes!(
            shifts::patient_shifts,
            shifts::create_shift,
            shifts::update_shift_handler,
            shifts::delete_shift_handler
        ))
        .routes(routes!(shifts::submit_notes))
        .routes(routes!(shifts::submit_report))
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(vec![
            tag("health", "Service and database status"),
            tag("user", "Registration, sessions, and email verification"),
            tag("patient", "Patients owned by a coordinator"),
            tag("carer", "Carer invitations and rosters"),
            tag("shift", "Shift scheduling, notes, and incident reports"),
        ]))
        .build()
}

/// First Cargo author, split into name and `<email>`.
fn cargo_contact() -> Option<Contact> {
    let primary = env!("CARGO_PKG_AUTHORS").split(':').next().map(str::trim)?;
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

fn optional_str(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            optional_str(name),
            optional_str(email.trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, "carelink");
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            doc.info.description.as_deref(),
            Some("Caregiving coordination API")
        );

        let contact = doc.info.contact.unwrap_or_default();
        assert_eq!(contact.name.as_deref(), Some("Team Carelink"));
        assert_eq!(contact.email.as_deref(), Some("team@carelink.dev"));

        let license = doc.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn every_resource_is_documented() {
        let doc = openapi();
        let tags = doc.tags.clone().unwrap_or_default();
        for name in ["health", "user", "patient", "carer", "shift"] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag {name}");
        }
        for path in [
            "/health",
            "/user",
            "/user/register",
            "/user/login",
            "/user/logout",
            "/user/verification/{token}",
            "/user/resend-verification",
            "/patient",
            "/patient/{id}",
            "/carer/invite/{id}",
            "/carer/add/{token}",
            "/carer/remove/{patient_id}/{carer_id}",
            "/shift",
            "/shift/{id}",
            "/shift/notes/{id}",
            "/shift/reports/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn author_parsing() {
        assert_eq!(
            parse_author("Team Carelink <team@carelink.dev>"),
            (Some("Team Carelink"), Some("team@carelink.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<only@mail.dev>"), (None, Some("only@mail.dev")));
        assert_eq!(parse_author("  "), (None, None));
    }
}
