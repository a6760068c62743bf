//! The page an establishment uses to correct one of its ledger entries.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    database_id::EntryId,
    endpoints::{self, format_endpoint},
    html::{
        BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base,
    },
    ledger::{
        core::{EntryDetails, get_entry_details},
        form::entry_form_fields,
        mutation::EditWindow,
    },
    navigation::NavBar,
    timezone::format_local,
};

/// The state needed for the edit entry page.
#[derive(Debug, Clone)]
pub struct EditEntryPageState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
    pub edit_window: EditWindow,
}

impl FromRef<AppState> for EditEntryPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            edit_window: state.edit_window,
        }
    }
}

fn edit_entry_view(details: &EntryDetails, created_at: &str, user: &CurrentUser) -> Markup {
    let entry = &details.entry;
    let update_url = format_endpoint(endpoints::ENTRY_API, entry.id);

    let content = html! {
        (NavBar::new(endpoints::EDIT_ENTRY_VIEW, user.role).into_html())

        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-xl font-bold mb-4" { "Editar lançamento" }

            form
                hx-put=(update_url)
                hx-target-error="#alert-container"
                class="w-full space-y-4 md:space-y-6"
            {
                div
                {
                    label for="member" class=(FORM_LABEL_STYLE) { "Cooperado" }
                    input
                        type="text"
                        id="member"
                        value=(details.member_name)
                        disabled
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                p class="text-sm text-gray-500 dark:text-gray-400"
                {
                    "Registrado em " (created_at)
                }

                (entry_form_fields(
                    &entry.amount.to_input_string(),
                    &entry.order_number,
                    entry.description.as_deref().unwrap_or_default(),
                ))

                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Salvar" }
            }
        }
    };

    base("Editar lançamento", &[], &content)
}

/// Renders the edit form for an entry the user's establishment owns, while
/// the edit window is open.
pub async fn get_edit_entry_page(
    State(state): State<EditEntryPageState>,
    Extension(user): Extension<CurrentUser>,
    Path(entry_id): Path<EntryId>,
) -> Result<Response, Error> {
    let establishment_id = user.establishment_id()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let details = get_entry_details(entry_id, &connection)
        .inspect_err(|error| tracing::warn!("could not get ledger entry {entry_id}: {error}"))?;

    if details.entry.establishment_id != establishment_id {
        return Err(Error::NotEntryOwner);
    }

    if !state
        .edit_window
        .is_open(details.entry.created_at, OffsetDateTime::now_utc())
    {
        return Err(Error::EditWindowExpired);
    }

    let created_at = format_local(details.entry.created_at, &state.local_timezone);

    Ok(edit_entry_view(&details, &created_at, &user).into_response())
}
