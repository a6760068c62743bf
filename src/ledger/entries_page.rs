//! The filtered ledger listing.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    auth::{CurrentUser, Role},
    endpoints::{self, format_endpoint},
    establishment::list_establishments,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, LINK_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        edit_delete_action_links, summary_card,
    },
    ledger::{
        core::{EntryDetails, query_entries},
        filter::{DefaultPeriod, EntryQuery, Period},
        mutation::EditWindow,
    },
    member::list_members,
    money::Money,
    navigation::NavBar,
    timezone::{format_local, format_local_iso},
};

/// The state needed for the [get_entries_page] route handler.
#[derive(Debug, Clone)]
pub struct EntriesPageState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
    pub edit_window: EditWindow,
}

impl FromRef<AppState> for EntriesPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            edit_window: state.edit_window,
        }
    }
}

/// An entry as shown in the table.
#[derive(Debug, Clone, PartialEq)]
struct EntryTableRow {
    id: i64,
    created_at: String,
    created_at_iso: String,
    order_number: String,
    member_name: String,
    establishment_name: String,
    amount: Money,
    description: String,
    edit_url: Option<String>,
    delete_url: Option<String>,
}

/// The choices offered by the filter form's selects, as (ID, name).
#[derive(Debug, Default)]
struct FilterOptions {
    members: Vec<(i64, String)>,
    establishments: Vec<(i64, String)>,
}

/// The links the user may follow for an entry, as (edit, delete).
///
/// The owning establishment may edit and delete while the window is open,
/// administrators may delete at any time.
fn entry_actions(
    details: &EntryDetails,
    user: &CurrentUser,
    edit_window: EditWindow,
    now: OffsetDateTime,
) -> (Option<String>, Option<String>) {
    let entry = &details.entry;

    match user.role {
        Role::Admin => (None, Some(format_endpoint(endpoints::ENTRY_API, entry.id))),
        Role::Establishment
            if user.link_id == entry.establishment_id
                && edit_window.is_open(entry.created_at, now) =>
        {
            (
                Some(format_endpoint(endpoints::EDIT_ENTRY_VIEW, entry.id)),
                Some(format_endpoint(endpoints::ENTRY_API, entry.id)),
            )
        }
        _ => (None, None),
    }
}

fn to_table_row(
    details: EntryDetails,
    user: &CurrentUser,
    edit_window: EditWindow,
    now: OffsetDateTime,
    timezone: &str,
) -> EntryTableRow {
    let (edit_url, delete_url) = entry_actions(&details, user, edit_window, now);
    let EntryDetails {
        entry,
        member_name,
        establishment_name,
    } = details;

    EntryTableRow {
        id: entry.id,
        created_at: format_local(entry.created_at, timezone),
        created_at_iso: format_local_iso(entry.created_at, timezone),
        order_number: entry.order_number,
        member_name,
        establishment_name,
        amount: entry.amount,
        description: entry.description.unwrap_or_default(),
        edit_url,
        delete_url,
    }
}

const MONTH_NAMES: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

const DAY_FORMAT: &[BorrowedFormatItem] = format_description!("[day]/[month]/[year]");

/// A short description of `period`, e.g. "março de 2024".
pub fn describe_period(period: Option<Period>) -> String {
    match period {
        None => "Todo o período".to_owned(),
        Some(Period::Month { year, month }) => {
            format!("{} de {year}", MONTH_NAMES[usize::from(u8::from(month)) - 1])
        }
        Some(Period::Days(days)) => {
            let start = days.start.format(DAY_FORMAT).unwrap_or_default();
            let end = days.end.format(DAY_FORMAT).unwrap_or_default();

            if days.start == days.end {
                start
            } else {
                format!("{start} a {end}")
            }
        }
    }
}

/// The `YYYY-mm` value for a month input.
fn month_input_value(period: Option<Period>) -> String {
    match period {
        Some(Period::Month { year, month }) => format!("{year:04}-{:02}", u8::from(month)),
        _ => String::new(),
    }
}

fn select_input(
    name: &str,
    label: &str,
    options: &[(i64, String)],
    selected: Option<&str>,
) -> Markup {
    html! {
        div
        {
            label for=(name) class=(FORM_LABEL_STYLE) { (label) }

            select name=(name) id=(name) class=(FORM_TEXT_INPUT_STYLE)
            {
                option value="" { "Todos" }

                @for (id, option_name) in options {
                    @let value = id.to_string();
                    option value=(value) selected[selected == Some(value.as_str())]
                    {
                        (option_name)
                    }
                }
            }
        }
    }
}

fn filter_form(query: &EntryQuery, options: &FilterOptions, period: Option<Period>) -> Markup {
    let month_value = query
        .month
        .clone()
        .filter(|month| !month.trim().is_empty())
        .unwrap_or_else(|| month_input_value(period));

    html! {
        form
            method="get"
            action=(endpoints::ENTRIES_VIEW)
            class="grid grid-cols-1 gap-4 md:grid-cols-3 lg:grid-cols-6 items-end w-full"
        {
            @if !options.members.is_empty() {
                (select_input("member_id", "Cooperado", &options.members, query.member_id.as_deref()))
            }

            @if !options.establishments.is_empty() {
                (select_input(
                    "establishment_id",
                    "Estabelecimento",
                    &options.establishments,
                    query.establishment_id.as_deref(),
                ))
            }

            div
            {
                label for="start" class=(FORM_LABEL_STYLE) { "De" }
                input
                    type="date"
                    name="start"
                    id="start"
                    value=(query.start.as_deref().unwrap_or_default())
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="end" class=(FORM_LABEL_STYLE) { "Até" }
                input
                    type="date"
                    name="end"
                    id="end"
                    value=(query.end.as_deref().unwrap_or_default())
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="month" class=(FORM_LABEL_STYLE) { "Mês" }
                input
                    type="month"
                    name="month"
                    id="month"
                    value=(month_value)
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Filtrar" }
        }
    }
}

fn entries_view(
    user: &CurrentUser,
    query: &EntryQuery,
    options: &FilterOptions,
    period: Option<Period>,
    rows: &[EntryTableRow],
) -> Markup {
    let total = rows.iter().fold(Money::ZERO, |total, row| total + row.amount);
    let query_string = query.to_query_string();
    let export_url = if query_string.is_empty() {
        endpoints::EXPORT_ENTRIES.to_owned()
    } else {
        format!("{}?{query_string}", endpoints::EXPORT_ENTRIES)
    };

    let table_row = |row: &EntryTableRow| {
        let actions = edit_delete_action_links(
            row.edit_url.as_deref(),
            row.delete_url.as_deref(),
            &format!(
                "Excluir o lançamento {} de {}? O valor volta para o crédito do cooperado.",
                row.order_number, row.member_name
            ),
            "closest tr",
            "delete",
        );

        html!(
            tr class=(TABLE_ROW_STYLE) data-entry-id=(row.id)
            {
                td class=(TABLE_CELL_STYLE)
                {
                    time datetime=(row.created_at_iso) { (row.created_at) }
                }
                td class=(TABLE_CELL_STYLE) { (row.order_number) }
                th
                    scope="row"
                    class="px-6 py-4 font-medium text-gray-900 whitespace-nowrap dark:text-white"
                {
                    (row.member_name)
                }
                td class=(TABLE_CELL_STYLE) { (row.establishment_name) }
                td class="px-6 py-4 text-right tabular-nums" { (row.amount) }
                td class=(TABLE_CELL_STYLE) { (row.description) }
                td class=(TABLE_CELL_STYLE) { (actions) }
            }
        )
    };

    let content = html!(
        (NavBar::new(endpoints::ENTRIES_VIEW, user.role).into_html())

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-6xl"
            {
                header class="flex justify-between flex-wrap items-end gap-2"
                {
                    div
                    {
                        h1 class="text-xl font-bold" { "Lançamentos" }
                        p class="text-sm text-gray-500 dark:text-gray-400" { (describe_period(period)) }
                    }

                    a href=(export_url) class=(LINK_STYLE) { "Exportar planilha" }
                }

                (filter_form(query, options, period))

                div class="grid grid-cols-1 gap-4 md:grid-cols-2"
                {
                    (summary_card("Lançamentos", &rows.len().to_string()))
                    (summary_card("Total", &total.to_string()))
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
                                th scope="col" class=(TABLE_CELL_STYLE) { "Nº OS" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Cooperado" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Estabelecimento" }
                                th scope="col" class="px-6 py-3 text-right" { "Valor" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Descrição" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Ações" }
                            }
                        }

                        tbody
                        {
                            @for row in rows {
                                (table_row(row))
                            }

                            @if rows.is_empty() {
                                tr
                                {
                                    td
                                        colspan="7"
                                        class="px-6 py-4 text-center text-gray-500 dark:text-gray-400"
                                    {
                                        "Nenhum lançamento no período."
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    );

    base("Lançamentos", &[], &content)
}

fn filter_options(user: &CurrentUser, connection: &Connection) -> Result<FilterOptions, Error> {
    let members = match user.role {
        Role::Admin | Role::Establishment => list_members(connection)?
            .into_iter()
            .map(|member| (member.id, member.name))
            .collect(),
        Role::Member => Vec::new(),
    };

    let establishments = match user.role {
        Role::Admin => list_establishments(connection)?
            .into_iter()
            .map(|establishment| (establishment.id, establishment.name))
            .collect(),
        _ => Vec::new(),
    };

    Ok(FilterOptions {
        members,
        establishments,
    })
}

/// Renders the ledger listing, filtered by the query string and restricted
/// to the entries the user may see.
pub async fn get_entries_page(
    State(state): State<EntriesPageState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<EntryQuery>,
) -> Result<Response, Error> {
    let now = OffsetDateTime::now_utc();
    let filter = query.to_filter(&user, DefaultPeriod::CurrentMonth, now, &state.local_timezone)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let rows: Vec<EntryTableRow> = query_entries(&filter, &state.local_timezone, &connection)
        .inspect_err(|error| tracing::error!("could not get ledger entries: {error}"))?
        .into_iter()
        .map(|details| to_table_row(details, &user, state.edit_window, now, &state.local_timezone))
        .collect();

    let options = filter_options(&user, &connection)
        .inspect_err(|error| tracing::error!("could not get filter options: {error}"))?;

    Ok(entries_view(&user, &query, &options, filter.period, &rows).into_response())
}
