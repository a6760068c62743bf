//! Application router configuration with protected and unprotected route definitions.

use std::path::Path;

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    middleware,
    response::Redirect,
    routing::{get, post, put},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth::{CurrentUser, auth_guard, auth_guard_hx, get_log_in_page, get_log_out, post_log_in},
    dashboard::get_dashboard_page,
    endpoints,
    establishment::{
        create_establishment_endpoint, delete_establishment_endpoint,
        edit_establishment_endpoint, get_create_establishment_page, get_edit_establishment_page,
        get_establishment_logo_endpoint, get_establishment_panel, get_establishments_page,
    },
    image::UPLOAD_BODY_LIMIT,
    internal_server_error::get_internal_server_error_page,
    ledger::{
        create_entry_endpoint, delete_entry_endpoint, edit_entry_endpoint, export_entries,
        get_edit_entry_page, get_entries_page, get_entry_info, get_last_entry_id,
    },
    member::{
        create_member_endpoint, delete_member_endpoint, edit_member_endpoint,
        get_create_member_page, get_edit_member_page, get_member_panel, get_member_photo_endpoint,
        get_members_page, set_member_credit_endpoint,
    },
    not_found::get_404_not_found,
};

/// Return a router with all the app's routes.
///
/// Files under `static_dir` are served from [endpoints::STATIC].
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN_VIEW, get(get_log_in_page))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    let protected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::DASHBOARD_VIEW, get(get_dashboard_page))
        .route(
            endpoints::ESTABLISHMENT_PANEL_VIEW,
            get(get_establishment_panel),
        )
        .route(endpoints::MEMBER_PANEL_VIEW, get(get_member_panel))
        .route(endpoints::MEMBERS_VIEW, get(get_members_page))
        .route(endpoints::NEW_MEMBER_VIEW, get(get_create_member_page))
        .route(endpoints::EDIT_MEMBER_VIEW, get(get_edit_member_page))
        .route(endpoints::MEMBER_PHOTO, get(get_member_photo_endpoint))
        .route(endpoints::ESTABLISHMENTS_VIEW, get(get_establishments_page))
        .route(
            endpoints::NEW_ESTABLISHMENT_VIEW,
            get(get_create_establishment_page),
        )
        .route(
            endpoints::EDIT_ESTABLISHMENT_VIEW,
            get(get_edit_establishment_page),
        )
        .route(
            endpoints::ESTABLISHMENT_LOGO,
            get(get_establishment_logo_endpoint),
        )
        .route(endpoints::ENTRIES_VIEW, get(get_entries_page))
        .route(endpoints::EXPORT_ENTRIES, get(export_entries))
        .route(endpoints::EDIT_ENTRY_VIEW, get(get_edit_entry_page))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    // Member and establishment forms carry images, so they get a larger body limit.
    let upload_routes = Router::new()
        .route(endpoints::MEMBERS_API, post(create_member_endpoint))
        .route(
            endpoints::MEMBER_API,
            put(edit_member_endpoint).delete(delete_member_endpoint),
        )
        .route(
            endpoints::ESTABLISHMENTS_API,
            post(create_establishment_endpoint),
        )
        .route(
            endpoints::ESTABLISHMENT_API,
            put(edit_establishment_endpoint).delete(delete_establishment_endpoint),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    // These routes need to use the HX-REDIRECT header for auth redirects to work properly for HTMX requests.
    let protected_routes = protected_routes.merge(
        Router::new()
            .merge(upload_routes)
            .route(endpoints::MEMBER_CREDIT_API, put(set_member_credit_endpoint))
            .route(endpoints::ENTRIES_API, post(create_entry_endpoint))
            .route(
                endpoints::ENTRY_API,
                put(edit_entry_endpoint).delete(delete_entry_endpoint),
            )
            .route(endpoints::LAST_ENTRY_API, get(get_last_entry_id))
            .route(endpoints::ENTRY_INFO_API, get(get_entry_info))
            .layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
    );

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new(static_dir))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' redirects to the home page of the logged in user's role.
async fn get_index_page(Extension(user): Extension<CurrentUser>) -> Redirect {
    Redirect::to(user.role.home_endpoint())
}

#[cfg(test)]
mod root_route_tests {
    use axum::{Extension, http::StatusCode, response::IntoResponse};

    use crate::{
        endpoints,
        routing::get_index_page,
        test_utils::{admin_user, establishment_user, member_user},
    };

    #[tokio::test]
    async fn root_redirects_to_role_home() {
        for (user, want) in [
            (admin_user(), endpoints::DASHBOARD_VIEW),
            (establishment_user(3), endpoints::ESTABLISHMENT_PANEL_VIEW),
            (member_user(4), endpoints::MEMBER_PANEL_VIEW),
        ] {
            let response = get_index_page(Extension(user)).await.into_response();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);

            let location = response.headers().get("location").unwrap();
            assert_eq!(location, want);
        }
    }
}

#[cfg(test)]
mod router_tests {
    use std::path::Path;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::Value;

    use crate::{
        AppState,
        auth::{COOKIE_TOKEN, PasswordHash, ValidatedPassword, create_admin},
        endpoints::{self, format_endpoint},
        money::Money,
        test_utils::{get_test_app_state, seed_establishment, seed_member},
    };

    use super::build_router;

    fn get_test_server(state: AppState) -> TestServer {
        let app = build_router(state, Path::new("static/"));

        TestServer::try_new(app).expect("Could not create test server.")
    }

    fn with_admin(state: &AppState) {
        let connection = state.db_connection.lock().unwrap();
        // The lowest bcrypt cost keeps these tests fast.
        let password_hash =
            PasswordHash::new(ValidatedPassword::new_unchecked("admin-secret"), 4).unwrap();
        create_admin("Ana", "ana", None, &password_hash, &connection).unwrap();
    }

    #[tokio::test]
    async fn pages_redirect_to_log_in_without_cookie() {
        let server = get_test_server(get_test_app_state());

        let response = server.get(endpoints::DASHBOARD_VIEW).await;

        response.assert_status_see_other();
        assert!(
            response
                .header("location")
                .to_str()
                .unwrap()
                .starts_with(endpoints::LOG_IN_VIEW)
        );
    }

    #[tokio::test]
    async fn log_in_page_is_public() {
        let server = get_test_server(get_test_app_state());

        server.get(endpoints::LOG_IN_VIEW).await.assert_status_ok();
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_test_server(get_test_app_state());

        server
            .get("/nao-existe")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_reaches_dashboard_and_polls_last_entry() {
        let state = get_test_app_state();
        with_admin(&state);
        let server = get_test_server(state);

        let response = server
            .post(endpoints::LOG_IN_API)
            .form(&[("identifier", "ana"), ("password", "admin-secret"), ("role", "")])
            .await;
        let token_cookie = response.cookie(COOKIE_TOKEN);

        server
            .get(endpoints::DASHBOARD_VIEW)
            .add_cookie(token_cookie.clone())
            .await
            .assert_status_ok();

        let response = server
            .get(endpoints::LAST_ENTRY_API)
            .add_cookie(token_cookie)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["last_id"], 0);
    }

    #[tokio::test]
    async fn admin_can_set_member_credit_through_router() {
        let state = get_test_app_state();
        with_admin(&state);
        let member_id = {
            let connection = state.db_connection.lock().unwrap();
            seed_establishment("Padaria", "padaria", &connection);
            seed_member("Maria", "maria", Money::ZERO, &connection)
        };
        let server = get_test_server(state);
        let token_cookie = server
            .post(endpoints::LOG_IN_API)
            .form(&[("identifier", "ana"), ("password", "admin-secret"), ("role", "")])
            .await
            .cookie(COOKIE_TOKEN);

        let response = server
            .put(&format_endpoint(endpoints::MEMBER_CREDIT_API, member_id))
            .add_cookie(token_cookie)
            .form(&[("credit", "150,00")])
            .await;

        response.assert_status_see_other();
        assert_eq!(response.header("hx-redirect"), endpoints::MEMBERS_VIEW);
    }
}
