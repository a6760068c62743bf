//! The page members land on after logging in.

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
    html::{
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        summary_card,
    },
    ledger::{EntryDetails, EntryFilter, Period, describe_period, query_entries},
    member::core::{Member, get_member},
    money::Money,
    navigation::NavBar,
    timezone::format_local,
};

/// The state needed for the member panel.
#[derive(Debug, Clone)]
pub struct MemberPanelState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for MemberPanelState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

fn member_panel_view(
    member: &Member,
    period: Period,
    entries: &[EntryDetails],
    timezone: &str,
) -> Markup {
    let spent = entries
        .iter()
        .fold(Money::ZERO, |total, details| total + details.entry.amount);

    let content = html! {
        (NavBar::new(endpoints::MEMBER_PANEL_VIEW, Role::Member).into_html())

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-4xl"
            {
                header
                {
                    h1 class="text-xl font-bold" { "Olá, " (member.name) }
                    p class="text-sm text-gray-500 dark:text-gray-400" { (describe_period(Some(period))) }
                }

                div class="grid grid-cols-1 gap-4 md:grid-cols-2"
                {
                    (summary_card("Crédito disponível", &member.credit.to_string()))
                    (summary_card("Gasto no mês", &spent.to_string()))
                }

                div class="w-full overflow-x-auto dark:bg-gray-800"
                {
                    table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Data" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Estabelecimento" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Nº OS" }
                                th scope="col" class="px-6 py-3 text-right" { "Valor" }
                            }
                        }

                        tbody
                        {
                            @for details in entries {
                                tr class=(TABLE_ROW_STYLE)
                                {
                                    td class=(TABLE_CELL_STYLE) { (format_local(details.entry.created_at, timezone)) }
                                    td class=(TABLE_CELL_STYLE) { (details.establishment_name) }
                                    td class=(TABLE_CELL_STYLE) { (details.entry.order_number) }
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
    };

    base("Painel", &[], &content)
}

/// Renders the member's credit and their entries for the current month.
pub async fn get_member_panel(
    State(state): State<MemberPanelState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, Error> {
    let member_id = user.member_id()?;
    let period = Period::current_month(OffsetDateTime::now_utc(), &state.local_timezone)?;
    let filter = EntryFilter {
        member_id: Some(member_id),
        establishment_id: None,
        period: Some(period),
    };

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let member = get_member(member_id, &connection)
        .inspect_err(|error| tracing::error!("could not get member {member_id}: {error}"))?;
    let entries = query_entries(&filter, &state.local_timezone, &connection)
        .inspect_err(|error| {
            tracing::error!("could not get entries of member {member_id}: {error}")
        })?;

    Ok(member_panel_view(&member, period, &entries, &state.local_timezone).into_response())
}
