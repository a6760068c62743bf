//! Reading and writing the encrypted auth cookie.

use std::cmp::max;

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{CurrentUser, Token},
};

pub const COOKIE_TOKEN: &str = "token";
/// The default duration for which auth cookies are valid.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(5);

fn build_token_cookie(token: &Token) -> Result<Cookie<'static>, Error> {
    let token_string =
        serde_json::to_string(token).map_err(|error| Error::InvalidToken(error.to_string()))?;

    Ok(Cookie::build((COOKIE_TOKEN, token_string))
        .expires(token.expires_at)
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(true)
        .path("/")
        .build())
}

/// Add the auth cookie for `user` to `jar`, valid for `duration` from now.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the token cannot be serialized.
pub fn set_auth_cookie(
    jar: PrivateCookieJar,
    user: CurrentUser,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let token = Token {
        user_id: user.user_id,
        role: user.role,
        link_id: user.link_id,
        expires_at: OffsetDateTime::now_utc() + duration,
    };

    Ok(jar.add(build_token_cookie(&token)?))
}

/// Overwrite the auth cookie with an expired one so the client deletes it.
pub fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true)
            .path("/"),
    )
}

/// Read and check the token in the auth cookie.
///
/// # Errors
///
/// Returns [Error::CookieMissing] if there is no auth cookie and
/// [Error::InvalidToken] if the token cannot be read or has expired.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<Token, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::CookieMissing)?;
    let token: Token = serde_json::from_str(cookie.value_trimmed())
        .map_err(|error| Error::InvalidToken(error.to_string()))?;

    if token.expires_at <= OffsetDateTime::now_utc() {
        return Err(Error::InvalidToken("token has expired".to_owned()));
    }

    Ok(token)
}

/// Push the expiry of the auth cookie to at least `duration` from now.
///
/// The jar is returned unchanged when the cookie already outlives that.
///
/// # Errors
///
/// Returns an error if the cookie is missing or invalid, or if the new expiry
/// would overflow.
pub(crate) fn extend_auth_cookie_duration_if_needed(
    jar: PrivateCookieJar,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let mut token = get_token_from_cookies(&jar)?;
    let new_expiry = OffsetDateTime::now_utc()
        .checked_add(duration)
        .ok_or_else(|| Error::InvalidToken("expiry out of range".to_owned()))?;

    if new_expiry <= token.expires_at {
        return Ok(jar);
    }

    token.expires_at = max(token.expires_at, new_expiry);

    Ok(jar.add(build_token_cookie(&token)?))
}
