//! The log-in page and the handler for log-in requests.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{
        CurrentUser, Role, find_user_by_identifier, invalidate_auth_cookie,
        normalize_redirect_url, set_auth_cookie,
    },
    endpoints,
    html::{
        FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base, loading_spinner, log_in_register,
        password_input,
    },
};

const ROLE_CHOICES: [(&str, &str); 4] = [
    ("", "Detectar automaticamente"),
    ("establishment", "Estabelecimento"),
    ("member", "Cooperado"),
    ("admin", "Administrador"),
];

fn log_in_form(
    identifier: &str,
    role: Option<Role>,
    error_message: Option<&str>,
    redirect_url: Option<&str>,
) -> Markup {
    let selected_role = role.map_or("", |role| role.as_str());

    html! {
        form
            hx-post=(endpoints::LOG_IN_API)
            hx-swap="outerHTML"
            hx-indicator="#indicator"
            hx-disabled-elt="#identifier, #password, #submit-button"
            class="space-y-4 md:space-y-6"
        {
            @if let Some(redirect_url) = redirect_url {
                input type="hidden" name="redirect_url" value=(redirect_url);
            }

            div
            {
                label for="identifier" class=(FORM_LABEL_STYLE) { "E-mail ou usuário" }

                input
                    type="text"
                    name="identifier"
                    id="identifier"
                    autocomplete="username"
                    class=(FORM_TEXT_INPUT_STYLE)
                    required
                    autofocus
                    value=(identifier);
            }

            (password_input("", 0, error_message))

            div
            {
                label for="role" class=(FORM_LABEL_STYLE) { "Entrar como" }

                select name="role" id="role" class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for (value, label) in ROLE_CHOICES {
                        option value=(value) selected[value == selected_role] { (label) }
                    }
                }
            }

            div class="flex items-center gap-x-3"
            {
                input
                    type="checkbox"
                    name="remember_me"
                    id="remember_me"
                    tabindex="0"
                    class="rounded-xs";

                label
                    for="remember_me"
                    class="block text-sm font-medium text-gray-900 dark:text-white"
                {
                    "Manter conectado por uma semana"
                }
            }

            button
                type="submit" id="submit-button" tabindex="0"
                class="w-full px-4 py-2 bg-blue-500 dark:bg-blue-600 disabled:bg-blue-700
                    hover:enabled:bg-blue-600 hover:enabled:dark:bg-blue-700 text-white rounded"
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Entrar"
            }
        }
    }
}

fn parse_redirect_url(raw_url: Option<&str>, source: &str) -> Option<String> {
    let raw_url = raw_url.filter(|url| !url.is_empty())?;
    let redirect_url = normalize_redirect_url(raw_url);

    if redirect_url.is_none() {
        tracing::warn!("Invalid redirect URL from {source}: {raw_url}");
    }

    redirect_url
}

/// Display the log-in page.
pub async fn get_log_in_page(Query(query): Query<RedirectQuery>) -> Response {
    let redirect_url = parse_redirect_url(query.redirect_url.as_deref(), "log-in query");
    let log_in_form = log_in_form("", None, None, redirect_url.as_deref());
    let content = log_in_register("Acesse sua conta", &log_in_form);

    base("Entrar", &[], &content).into_response()
}

/// How long the auth cookie should last if the user selects "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LoginState> for Key {
    fn from_ref(state: &LoginState) -> Self {
        state.cookie_key.clone()
    }
}

pub const INVALID_CREDENTIALS_ERROR_MSG: &str = "Usuário ou senha inválidos.";
const INTERNAL_ERROR_MSG: &str = "Ocorreu um erro interno. Tente novamente mais tarde.";

/// Handler for log-in requests via the POST method.
///
/// On success the auth cookie is set and the client is redirected to the
/// requested page or the home page of the user's role. Otherwise the form is
/// returned with an error message. An unknown identifier and a wrong password
/// get the same message.
pub async fn post_log_in(
    State(state): State<LoginState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<LogInData>,
) -> Response {
    let redirect_url = parse_redirect_url(user_data.redirect_url.as_deref(), "log-in form");
    let redirect_url = redirect_url.as_deref();
    let role = user_data.role.as_deref().and_then(Role::from_db);
    let render_error = |message: &str| {
        log_in_form(&user_data.identifier, role, Some(message), redirect_url).into_response()
    };

    let user = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return render_error(INTERNAL_ERROR_MSG);
            }
        };

        find_user_by_identifier(&user_data.identifier, role, &connection)
    };

    let user = match user {
        Ok(user) => user,
        Err(Error::InvalidCredentials) => return render_error(INVALID_CREDENTIALS_ERROR_MSG),
        Err(error) => {
            tracing::error!("Unhandled error while looking up credentials: {error}");
            return render_error(INTERNAL_ERROR_MSG);
        }
    };

    match user.password_hash.verify(&user_data.password) {
        Ok(true) => {}
        Ok(false) => return render_error(INVALID_CREDENTIALS_ERROR_MSG),
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return render_error(INTERNAL_ERROR_MSG);
        }
    }

    let cookie_duration = if user_data.remember_me.is_some() {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };
    let redirect_url = redirect_url.unwrap_or(user.role.home_endpoint());

    tracing::info!("User {} logged in as {}", user.id, user.role);

    set_auth_cookie(jar.clone(), CurrentUser::from(&user), cookie_duration)
        .map(|updated_jar| {
            (
                StatusCode::SEE_OTHER,
                HxRedirect(redirect_url.to_owned()),
                updated_jar,
            )
        })
        .map_err(|err| {
            tracing::error!("Error setting auth cookie: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                HxRedirect(endpoints::INTERNAL_ERROR_VIEW.to_owned()),
                invalidate_auth_cookie(jar),
            )
        })
        .into_response()
}

/// The query string of the log-in page.
#[derive(Deserialize)]
pub struct RedirectQuery {
    /// The page to return to after logging in.
    pub redirect_url: Option<String>,
}

/// The raw data entered by the user in the log-in form.
#[derive(Clone, Deserialize)]
pub struct LogInData {
    /// An email address or a username.
    pub identifier: String,

    /// Password entered during log-in.
    pub password: String,

    /// Restrict the lookup to one role. Empty means any role.
    pub role: Option<String>,

    /// A checkbox: any value means "remember me", a missing field means no.
    pub remember_me: Option<String>,

    /// Optional URL to redirect to after logging in.
    pub redirect_url: Option<String>,
}

#[cfg(test)]
mod log_in_page_tests {
    use axum::extract::Query;
    use scraper::Selector;

    use crate::{
        endpoints,
        test_utils::{
            assert_form_input, assert_form_submit_button_with_text, assert_hx_endpoint,
            assert_status_ok, assert_valid_html, must_get_form, parse_html_document,
        },
    };

    use super::{RedirectQuery, get_log_in_page};

    #[tokio::test]
    async fn log_in_page_displays_form() {
        let response = get_log_in_page(Query(RedirectQuery { redirect_url: None })).await;

        assert_status_ok(&response);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);
        let form = must_get_form(&document);
        assert_hx_endpoint(&form, endpoints::LOG_IN_API, "hx-post");
        assert_form_input(&form, "identifier", "text");
        assert_form_input(&form, "password", "password");
        assert_form_submit_button_with_text(&form, "Entrar");

        let options = form
            .select(&Selector::parse("select[name=role] option").unwrap())
            .count();
        assert_eq!(options, 4);
    }

    #[tokio::test]
    async fn log_in_page_preserves_redirect_url() {
        let redirect_url = "/lancamentos?month=2024-03".to_owned();

        let response = get_log_in_page(Query(RedirectQuery {
            redirect_url: Some(redirect_url.clone()),
        }))
        .await;

        let document = parse_html_document(response).await;
        let input = document
            .select(&Selector::parse("input[name=redirect_url]").unwrap())
            .next()
            .expect("expected redirect_url input");
        assert_eq!(input.value().attr("value"), Some(redirect_url.as_str()));
    }

    #[tokio::test]
    async fn log_in_page_drops_external_redirect_url() {
        let response = get_log_in_page(Query(RedirectQuery {
            redirect_url: Some("https://example.com".to_owned()),
        }))
        .await;

        let document = parse_html_document(response).await;
        let inputs = document
            .select(&Selector::parse("input[name=redirect_url]").unwrap())
            .count();
        assert_eq!(inputs, 0);
    }
}
