//! Names and attributes of the cookies the server sets.

use axum_extra::extract::cookie::{Cookie, SameSite};
use cookie::time::Duration as CookieDuration;
use std::time::Duration;

pub const TOKEN_COOKIE: &str = "token";
pub const SESSION_COOKIE: &str = "sid";

pub fn token_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    build(TOKEN_COOKIE, token, ttl, secure)
}

pub fn session_cookie(session_id: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    build(SESSION_COOKIE, session_id, ttl, secure)
}

/// Cookie that tells the browser to drop `name`. Path must match the original.
pub fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

fn build(name: &'static str, value: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(CookieDuration::seconds(ttl.as_secs() as i64))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cookie_attributes() {
        let cookie = token_cookie("abc".into(), Duration::from_secs(1800), true);

        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(1800)));
    }

    #[test]
    fn test_insecure_cookie_for_development() {
        let cookie = session_cookie("sid-value".into(), Duration::from_secs(60), false);

        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.secure(), Some(false));
    }
}
