//! Authentication: signed tokens, password hashing, session cookies, and the
//! user records they resolve to.
//!
//! Sessions are stateless. Logging in issues a `session` token in the
//! `carelink_session` cookie and every protected handler calls
//! [`principal::require_auth`]. Email verification and carer invitations use
//! the same signing key with their own `act` claim and TTL.

pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod session;
mod state;
pub(crate) mod storage;
pub(crate) mod tokens;
pub(crate) mod utils;

pub use state::{AuthConfig, AuthState};
