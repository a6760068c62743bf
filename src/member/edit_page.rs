use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::{CurrentUser, Role, get_user_for_link},
    database_id::MemberId,
    endpoints::{self, format_endpoint},
    html::{BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, FORM_CONTAINER_STYLE, base, money_input},
    member::{
        core::{Member, get_member},
        form::{MemberFormValues, member_form_fields},
    },
    navigation::NavBar,
};

/// The state needed for the edit member page.
#[derive(Debug, Clone)]
pub struct EditMemberPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditMemberPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

fn edit_member_view(member: &Member, email: &str, user: &CurrentUser) -> Markup {
    let update_url = format_endpoint(endpoints::MEMBER_API, member.id);
    let credit_url = format_endpoint(endpoints::MEMBER_CREDIT_API, member.id);
    let photo_url = member
        .has_photo
        .then(|| format_endpoint(endpoints::MEMBER_PHOTO, member.id));

    let values = MemberFormValues {
        name: &member.name,
        username: &member.username,
        email,
        photo_url: photo_url.as_deref(),
    };

    let content = html! {
        (NavBar::new(endpoints::EDIT_MEMBER_VIEW, user.role).into_html())

        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-xl font-bold mb-4" { "Editar cooperado" }

            form
                id="member-form"
                hx-put=(update_url)
                hx-encoding="multipart/form-data"
                hx-target-error="#alert-container"
                class="w-full space-y-4 md:space-y-6"
            {
                (member_form_fields(&values, false))

                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Salvar" }
            }

            h2 class="text-lg font-bold mt-8 mb-2" { "Ajustar crédito" }

            p class="text-sm text-gray-500 dark:text-gray-400 mb-4"
            {
                "Crédito atual: " (member.credit) ". O novo valor substitui o saldo sem gerar lançamento."
            }

            form
                id="credit-form"
                hx-put=(credit_url)
                hx-target-error="#alert-container"
                hx-confirm="Substituir o crédito do cooperado?"
                class="w-full space-y-4 md:space-y-6"
            {
                (money_input("credit", "Novo crédito", &member.credit.to_input_string()))

                button type="submit" class=(BUTTON_SECONDARY_STYLE) { "Definir crédito" }
            }
        }
    };

    base("Editar cooperado", &[], &content)
}

/// Renders the page for changing a member's details and credit.
pub async fn get_edit_member_page(
    State(state): State<EditMemberPageState>,
    Extension(user): Extension<CurrentUser>,
    Path(member_id): Path<MemberId>,
) -> Result<Response, Error> {
    user.require_admin()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let member = get_member(member_id, &connection)
        .inspect_err(|error| tracing::warn!("could not get member {member_id}: {error}"))?;
    let email = get_user_for_link(Role::Member, member_id, &connection)?
        .and_then(|user| user.email)
        .unwrap_or_default();

    Ok(edit_member_view(&member, &email, &user).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
        response::IntoResponse,
    };
    use scraper::Selector;

    use crate::{
        Error,
        endpoints::{self, format_endpoint},
        money::Money,
        test_utils::{
            admin_user, assert_form_input_with_value, assert_status_ok, assert_valid_html,
            get_test_connection, member_user, parse_html_document, seed_member,
        },
    };

    use super::{EditMemberPageState, get_edit_member_page};

    fn state_with_member() -> (EditMemberPageState, i64) {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::from_cents(4250), &connection);

        (
            EditMemberPageState {
                db_connection: Arc::new(Mutex::new(connection)),
            },
            member,
        )
    }

    #[tokio::test]
    async fn renders_details_and_credit_forms() {
        let (state, member) = state_with_member();

        let response = get_edit_member_page(State(state), Extension(admin_user()), Path(member))
            .await
            .unwrap();

        assert_status_ok(&response);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);

        let member_form = html
            .select(&Selector::parse("form#member-form").unwrap())
            .next()
            .expect("no member form");
        assert_eq!(
            member_form.value().attr("hx-put"),
            Some(format_endpoint(endpoints::MEMBER_API, member).as_str())
        );
        assert_form_input_with_value(&member_form, "name", "text", "Maria");
        assert_form_input_with_value(&member_form, "username", "text", "maria");

        let credit_form = html
            .select(&Selector::parse("form#credit-form").unwrap())
            .next()
            .expect("no credit form");
        assert_eq!(
            credit_form.value().attr("hx-put"),
            Some(format_endpoint(endpoints::MEMBER_CREDIT_API, member).as_str())
        );
        assert_form_input_with_value(&credit_form, "credit", "text", "42,50");
    }

    #[tokio::test]
    async fn missing_member_is_not_found() {
        let (state, _) = state_with_member();

        let result = get_edit_member_page(State(state), Extension(admin_user()), Path(999)).await;

        assert_eq!(
            result.unwrap_err().into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn member_cannot_edit_themselves() {
        let (state, member) = state_with_member();

        let result =
            get_edit_member_page(State(state), Extension(member_user(member)), Path(member)).await;

        assert_eq!(result.unwrap_err(), Error::Forbidden);
    }
}
