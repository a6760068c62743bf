use axum::{
    Extension,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    Error,
    auth::CurrentUser,
    endpoints,
    establishment::form::{EstablishmentFormValues, establishment_form_fields},
    html::{BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, base, loading_spinner},
    navigation::NavBar,
};

fn create_establishment_view(user: &CurrentUser) -> Markup {
    let content = html! {
        (NavBar::new(endpoints::NEW_ESTABLISHMENT_VIEW, user.role).into_html())

        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-xl font-bold mb-4" { "Novo estabelecimento" }

            form
                hx-post=(endpoints::ESTABLISHMENTS_API)
                hx-encoding="multipart/form-data"
                hx-target-error="#alert-container"
                hx-indicator="#indicator"
                hx-disabled-elt="#submit-button"
                class="w-full space-y-4 md:space-y-6"
            {
                (establishment_form_fields(&EstablishmentFormValues::default(), true))

                button id="submit-button" type="submit" class=(BUTTON_PRIMARY_STYLE)
                {
                    span id="indicator" class="htmx-indicator" { (loading_spinner()) }
                    " Cadastrar"
                }
            }
        }
    };

    base("Novo estabelecimento", &[], &content)
}

/// Renders the page for registering an establishment.
pub async fn get_create_establishment_page(
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, Error> {
    user.require_admin()?;

    Ok(create_establishment_view(&user).into_response())
}

#[cfg(test)]
mod tests {
    use axum::Extension;

    use crate::{
        Error, endpoints,
        establishment::form::LOGO_FIELD,
        test_utils::{
            admin_user, assert_form_input, assert_form_submit_button, assert_hx_endpoint,
            assert_optional_form_input, assert_status_ok, assert_valid_html, member_user,
            must_get_form, parse_html_document,
        },
    };

    use super::get_create_establishment_page;

    #[tokio::test]
    async fn renders_form_with_required_password() {
        let response = get_create_establishment_page(Extension(admin_user()))
            .await
            .unwrap();

        assert_status_ok(&response);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let form = must_get_form(&html);
        assert_hx_endpoint(&form, endpoints::ESTABLISHMENTS_API, "hx-post");
        assert_form_input(&form, "name", "text");
        assert_form_input(&form, "username", "text");
        assert_optional_form_input(&form, "email", "email");
        assert_form_input(&form, "password", "password");
        assert_optional_form_input(&form, LOGO_FIELD, "file");
        assert_form_submit_button(&form);
    }

    #[tokio::test]
    async fn member_is_forbidden() {
        let result = get_create_establishment_page(Extension(member_user(1))).await;

        assert_eq!(result.unwrap_err(), Error::Forbidden);
    }
}
