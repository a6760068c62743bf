use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    Error,
    auth::{CurrentUser, Role, get_user_for_link},
    database_id::EstablishmentId,
    endpoints::{self, format_endpoint},
    establishment::{
        core::{Establishment, get_establishment},
        create_endpoint::EstablishmentFormState,
        form::{EstablishmentFormValues, establishment_form_fields},
    },
    html::{BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, base},
    navigation::NavBar,
};

fn edit_establishment_view(
    establishment: &Establishment,
    email: &str,
    user: &CurrentUser,
) -> Markup {
    let update_url = format_endpoint(endpoints::ESTABLISHMENT_API, establishment.id);
    let logo_url = establishment
        .has_logo
        .then(|| format_endpoint(endpoints::ESTABLISHMENT_LOGO, establishment.id));
    let values = EstablishmentFormValues {
        name: &establishment.name,
        username: &establishment.username,
        email,
        logo_url: logo_url.as_deref(),
    };

    let content = html! {
        (NavBar::new(endpoints::EDIT_ESTABLISHMENT_VIEW, user.role).into_html())

        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-xl font-bold mb-4" { "Editar estabelecimento" }

            form
                hx-put=(update_url)
                hx-encoding="multipart/form-data"
                hx-target-error="#alert-container"
                class="w-full space-y-4 md:space-y-6"
            {
                (establishment_form_fields(&values, false))

                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Salvar" }
            }
        }
    };

    base("Editar estabelecimento", &[], &content)
}

/// Renders the page for changing an establishment's details or password.
pub async fn get_edit_establishment_page(
    State(state): State<EstablishmentFormState>,
    Extension(user): Extension<CurrentUser>,
    Path(establishment_id): Path<EstablishmentId>,
) -> Result<Response, Error> {
    user.require_admin()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let establishment = get_establishment(establishment_id, &connection).inspect_err(|error| {
        tracing::warn!("could not get establishment {establishment_id}: {error}")
    })?;
    let email = get_user_for_link(Role::Establishment, establishment_id, &connection)?
        .and_then(|user| user.email)
        .unwrap_or_default();

    Ok(edit_establishment_view(&establishment, &email, &user).into_response())
}
