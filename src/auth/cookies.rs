use axum::{http::header::SET_COOKIE, response::AppendHeaders};

use super::token::{TokenKind, TokenPair};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

pub type CookieHeaders = AppendHeaders<[(axum::http::HeaderName, String); 2]>;

pub fn session_cookie(name: &str, value: &str, max_age: i64) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=Lax",
        name, value, max_age
    )
}

pub fn expired_cookie(name: &str) -> String {
    format!(
        "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Lax",
        name
    )
}

pub fn session_cookies(pair: &TokenPair) -> CookieHeaders {
    AppendHeaders([
        (
            SET_COOKIE,
            session_cookie(
                ACCESS_COOKIE,
                &pair.access_token,
                TokenKind::Access.ttl().num_seconds(),
            ),
        ),
        (
            SET_COOKIE,
            session_cookie(
                REFRESH_COOKIE,
                &pair.refresh_token,
                TokenKind::Refresh.ttl().num_seconds(),
            ),
        ),
    ])
}

pub fn cleared_cookies() -> CookieHeaders {
    AppendHeaders([
        (SET_COOKIE, expired_cookie(ACCESS_COOKIE)),
        (SET_COOKIE, expired_cookie(REFRESH_COOKIE)),
    ])
}
