//! Log-out route handler that invalidates authentication cookies and redirects users.

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;

use crate::{auth::invalidate_auth_cookie, endpoints};

/// Invalidate the auth cookie and redirect the client to the log-in page.
pub async fn get_log_out(jar: PrivateCookieJar) -> Response {
    let jar = invalidate_auth_cookie(jar);

    (jar, Redirect::to(endpoints::LOG_IN_VIEW)).into_response()
}

#[cfg(test)]
mod log_out_tests {
    use axum::http::{StatusCode, header::SET_COOKIE};
    use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
    use time::{Duration, OffsetDateTime};

    use crate::{
        app_state::create_cookie_key,
        auth::{
            COOKIE_TOKEN, CurrentUser, DEFAULT_COOKIE_DURATION, Role, UserID, set_auth_cookie,
        },
        endpoints,
        test_utils::get_header,
    };

    use super::get_log_out;

    #[tokio::test]
    async fn log_out_invalidates_auth_cookie_and_redirects() {
        let user = CurrentUser {
            user_id: UserID::new(123),
            role: Role::Admin,
            link_id: 1,
        };
        let jar = set_auth_cookie(
            PrivateCookieJar::new(create_cookie_key("42")),
            user,
            DEFAULT_COOKIE_DURATION,
        )
        .unwrap();

        let response = get_log_out(jar).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(get_header(&response, "location"), endpoints::LOG_IN_VIEW);

        let token_cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|header| Cookie::parse(header.to_str().ok()?.to_owned()).ok())
            .find(|cookie| cookie.name() == COOKIE_TOKEN)
            .expect("expected the token cookie to be overwritten");
        assert_eq!(
            token_cookie.expires_datetime(),
            Some(OffsetDateTime::UNIX_EPOCH)
        );
        assert_eq!(token_cookie.max_age(), Some(Duration::ZERO));
    }
}
