//! Caller identity from trusted upstream headers.
//!
//! The server does not authenticate anyone itself. An authentication proxy
//! in front of it sets these headers; a request without `X-User-Id` is
//! anonymous.

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use envwatch_session::{AuthUser, Session};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ADMIN_HEADER: &str = "x-user-admin";

/// Reads the caller from the identity headers.
///
/// The display name falls back to the user id. Only `true`, `1` and `yes`
/// (any case) grant admin.
#[must_use]
pub fn user_from_headers(headers: &HeaderMap) -> Option<AuthUser> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let id = header(USER_ID_HEADER)?;
    let is_admin = header(USER_ADMIN_HEADER).is_some_and(|v| {
        v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes")
    });

    Some(AuthUser {
        id: id.to_string(),
        display_name: header(USER_NAME_HEADER).unwrap_or(id).to_string(),
        email: header(USER_EMAIL_HEADER).map(str::to_string),
        is_admin,
    })
}

/// Builds the per-request session for `req`.
#[must_use]
pub fn session_from_request(req: &HttpRequest) -> Session {
    Session::with_identity(user_from_headers(req.headers()))
}
