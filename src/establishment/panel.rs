//! The page establishments land on after logging in: a form to debit a
//! member and the establishment's entries for the current month.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::{CurrentUser, Role},
    endpoints,
    establishment::core::{Establishment, get_establishment},
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, PAGE_CONTAINER_STYLE,
        TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, loading_spinner,
        summary_card,
    },
    ledger::{EntryDetails, EntryFilter, Period, describe_period, entry_form_fields, query_entries},
    member::{Member, list_members},
    money::Money,
    navigation::NavBar,
    timezone::format_local,
};

/// The state needed for the establishment panel.
#[derive(Debug, Clone)]
pub struct EstablishmentPanelState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for EstablishmentPanelState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

fn entry_form(members: &[Member]) -> Markup {
    html! {
        form
            hx-post=(endpoints::ENTRIES_API)
            hx-target-error="#alert-container"
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="w-full space-y-4"
        {
            div
            {
                label for="member_id" class=(FORM_LABEL_STYLE) { "Cooperado" }

                select name="member_id" id="member_id" required class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" { "Selecione o cooperado" }

                    @for member in members {
                        option value=(member.id)
                        {
                            (member.name) " (" (member.credit) ")"
                        }
                    }
                }
            }

            (entry_form_fields("", "", ""))

            button id="submit-button" type="submit" class=(BUTTON_PRIMARY_STYLE)
            {
                span id="indicator" class="htmx-indicator" { (loading_spinner()) }
                " Lançar"
            }
        }
    }
}

fn entries_table(entries: &[EntryDetails], timezone: &str) -> Markup {
    html! {
        div class="w-full overflow-x-auto dark:bg-gray-800"
        {
            table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Data" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Nº OS" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Cooperado" }
                        th scope="col" class="px-6 py-3 text-right" { "Valor" }
                    }
                }

                tbody
                {
                    @for details in entries {
                        tr class=(TABLE_ROW_STYLE) data-entry-id=(details.entry.id)
                        {
                            td class=(TABLE_CELL_STYLE) { (format_local(details.entry.created_at, timezone)) }
                            td class=(TABLE_CELL_STYLE) { (details.entry.order_number) }
                            td class=(TABLE_CELL_STYLE) { (details.member_name) }
                            td class="px-6 py-4 text-right tabular-nums" { (details.entry.amount) }
                        }
                    }

                    @if entries.is_empty() {
                        tr
                        {
                            td
                                colspan="4"
                                class="px-6 py-4 text-center text-gray-500 dark:text-gray-400"
                            {
                                "Nenhum lançamento neste mês."
                            }
                        }
                    }
                }
            }
        }
    }
}

fn establishment_panel_view(
    establishment: &Establishment,
    members: &[Member],
    period: Period,
    entries: &[EntryDetails],
    timezone: &str,
) -> Markup {
    let total = entries
        .iter()
        .fold(Money::ZERO, |total, details| total + details.entry.amount);

    let content = html! {
        (NavBar::new(endpoints::ESTABLISHMENT_PANEL_VIEW, Role::Establishment).into_html())

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="grid grid-cols-1 gap-6 w-full lg:max-w-6xl lg:grid-cols-3"
            {
                div class="space-y-4"
                {
                    h1 class="text-xl font-bold" { (establishment.name) }
                    h2 class="text-lg font-semibold" { "Novo lançamento" }
                    (entry_form(members))
                }

                div class="space-y-4 lg:col-span-2"
                {
                    p class="text-sm text-gray-500 dark:text-gray-400" { (describe_period(Some(period))) }

                    div class="grid grid-cols-1 gap-4 md:grid-cols-2"
                    {
                        (summary_card("Lançamentos no mês", &entries.len().to_string()))
                        (summary_card("Total no mês", &total.to_string()))
                    }

                    (entries_table(entries, timezone))
                }
            }
        }
    };

    base("Painel", &[], &content)
}

/// Renders the entry form and the establishment's entries for the current month.
pub async fn get_establishment_panel(
    State(state): State<EstablishmentPanelState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, Error> {
    let establishment_id = user.establishment_id()?;
    let period = Period::current_month(OffsetDateTime::now_utc(), &state.local_timezone)?;
    let filter = EntryFilter {
        member_id: None,
        establishment_id: Some(establishment_id),
        period: Some(period),
    };

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let establishment = get_establishment(establishment_id, &connection).inspect_err(|error| {
        tracing::error!("could not get establishment {establishment_id}: {error}")
    })?;
    let members = list_members(&connection)
        .inspect_err(|error| tracing::error!("could not get members: {error}"))?;
    let entries = query_entries(&filter, &state.local_timezone, &connection).inspect_err(|error| {
        tracing::error!("could not get entries of establishment {establishment_id}: {error}")
    })?;

    Ok(
        establishment_panel_view(&establishment, &members, period, &entries, &state.local_timezone)
            .into_response(),
    )
}
