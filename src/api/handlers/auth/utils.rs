//! Small validation helpers shared by the user and resource handlers.

use regex::Regex;
use uuid::Uuid;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic `x@y.z` check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Path ids that are not UUIDs can never match a row.
pub(crate) fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Trimmed value, or `None` when missing or blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn has_sqlstate(err: &sqlx::Error, sqlstate: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == sqlstate),
        _ => false,
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23505")
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23503")
}

pub(crate) fn is_check_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23514")
}

pub(crate) fn build_verify_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/verify-email/{token}")
}

pub(crate) fn build_invite_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/add-carer/{token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization_and_shape() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
        assert!(valid_email("jane@example.com"));
        assert!(!valid_email("jane.example.com"));
        assert!(!valid_email("jane@example"));
        assert!(!valid_email("ja ne@example.com"));
    }

    #[test]
    fn malformed_ids_are_none() {
        assert!(parse_id("not-a-uuid").is_none());
        assert!(parse_id("").is_none());
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()), Some(id));
    }

    #[test]
    fn blank_values_are_none() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(Some(" Ada ")), Some("Ada"));
    }

    #[test]
    fn links_trim_trailing_slash() {
        assert_eq!(
            build_verify_url("https://app.carelink.dev/", "tok"),
            "https://app.carelink.dev/verify-email/tok"
        );
        assert_eq!(
            build_invite_url("http://localhost:3000", "tok"),
            "http://localhost:3000/add-carer/tok"
        );
    }
}
