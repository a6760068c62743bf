use axum::{
    Extension,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    Error,
    auth::CurrentUser,
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, base, loading_spinner},
    member::form::{MemberFormValues, member_form_fields},
    navigation::NavBar,
};

fn create_member_view(user: &CurrentUser) -> Markup {
    let content = html! {
        (NavBar::new(endpoints::NEW_MEMBER_VIEW, user.role).into_html())

        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-xl font-bold mb-4" { "Novo cooperado" }

            form
                hx-post=(endpoints::MEMBERS_API)
                hx-encoding="multipart/form-data"
                hx-target-error="#alert-container"
                hx-indicator="#indicator"
                hx-disabled-elt="#submit-button"
                class="w-full space-y-4 md:space-y-6"
            {
                (member_form_fields(&MemberFormValues::default(), true))

                button id="submit-button" type="submit" class=(BUTTON_PRIMARY_STYLE)
                {
                    span id="indicator" class="htmx-indicator" { (loading_spinner()) }
                    " Cadastrar"
                }
            }
        }
    };

    base("Novo cooperado", &[], &content)
}

/// Renders the page for registering a member.
pub async fn get_create_member_page(
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, Error> {
    user.require_admin()?;

    Ok(create_member_view(&user).into_response())
}
