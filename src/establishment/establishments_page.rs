//! Displays the establishments to administrators.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::{CurrentUser, Role},
    endpoints::{self, format_endpoint},
    establishment::core::{Establishment, list_establishments},
    html::{
        LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        base, edit_delete_action_links,
    },
    navigation::NavBar,
    timezone::format_local,
};

/// The state needed for the [get_establishments_page] route handler.
#[derive(Debug, Clone)]
pub struct EstablishmentsPageState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for EstablishmentsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

fn establishments_view(establishments: &[Establishment], timezone: &str) -> Markup {
    let table_row = |establishment: &Establishment| {
        let edit_url = format_endpoint(endpoints::EDIT_ESTABLISHMENT_VIEW, establishment.id);
        let delete_url = format_endpoint(endpoints::ESTABLISHMENT_API, establishment.id);
        let created_at = establishment
            .created_at
            .map(|instant| format_local(instant, timezone))
            .unwrap_or_default();

        html!(
            tr class=(TABLE_ROW_STYLE)
            {
                td class=(TABLE_CELL_STYLE)
                {
                    @if establishment.has_logo {
                        img
                            src=(format_endpoint(endpoints::ESTABLISHMENT_LOGO, establishment.id))
                            alt=(establishment.name)
                            class="w-10 h-10 rounded object-contain";
                    }
                }

                th
                    scope="row"
                    class="px-6 py-4 font-medium text-gray-900 whitespace-nowrap dark:text-white"
                {
                    (establishment.name)
                }

                td class=(TABLE_CELL_STYLE) { (establishment.username) }
                td class=(TABLE_CELL_STYLE) { (created_at) }

                td class=(TABLE_CELL_STYLE)
                {
                    (edit_delete_action_links(
                        Some(&edit_url),
                        Some(&delete_url),
                        &format!(
                            "Excluir o estabelecimento '{}'? Esta ação não pode ser desfeita.",
                            establishment.name
                        ),
                        "closest tr",
                        "delete",
                    ))
                }
            }
        )
    };

    let content = html!(
        (NavBar::new(endpoints::ESTABLISHMENTS_VIEW, Role::Admin).into_html())

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-5xl"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Estabelecimentos" }

                    a href=(endpoints::NEW_ESTABLISHMENT_VIEW) class=(LINK_STYLE)
                    {
                        "Novo estabelecimento"
                    }
                }

                div class="w-full overflow-x-auto dark:bg-gray-800"
                {
                    table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Logo" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Nome" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Usuário" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Cadastrado em" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Ações" }
                            }
                        }

                        tbody
                        {
                            @for establishment in establishments {
                                (table_row(establishment))
                            }

                            @if establishments.is_empty() {
                                tr
                                {
                                    td
                                        colspan="5"
                                        class="px-6 py-4 text-center text-gray-500 dark:text-gray-400"
                                    {
                                        "Nenhum estabelecimento cadastrado."
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    );

    base("Estabelecimentos", &[], &content)
}

/// Renders the establishment list.
pub async fn get_establishments_page(
    State(state): State<EstablishmentsPageState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, Error> {
    user.require_admin()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let establishments = list_establishments(&connection)
        .inspect_err(|error| tracing::error!("could not get establishments: {error}"))?;

    Ok(establishments_view(&establishments, &state.local_timezone).into_response())
}
