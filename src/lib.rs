//! # Carelink (Caregiving Coordination API)
//!
//! `carelink` is the backend for coordinating care around a patient. A
//! coordinator registers patients, invites carers onto them, and schedules
//! shifts; carers record shift notes and incident reports for the shifts they
//! are assigned to.
//!
//! ## Roles
//!
//! Roles are not global. A user is a **coordinator** of the patients they
//! created and a **carer** of the patients whose roster they joined through an
//! invitation. Every patient has exactly one coordinator and any number of
//! carers.
//!
//! - **Read access** to a patient and its shifts is granted to the coordinator
//!   and to every carer on the roster.
//! - **Write access** (patient edits, roster changes, shift scheduling) belongs
//!   to the coordinator alone.
//! - **Shift notes and incident reports** may only be written by the carer the
//!   shift is assigned to.
//!
//! Authorization failures return `401` with `User is not authorized`, while a
//! missing resource returns `400`, so clients can tell the two apart.
//!
//! ## Tokens
//!
//! All credentials are HS256 JWTs signed with the server secret. The `act`
//! claim binds a token to one purpose (`session`, `verify_email`,
//! `add_carer`), so an invitation link can never be replayed as a session.
//! Session tokens travel in the `carelink_session` cookie.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }
}
