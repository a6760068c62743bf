//! Dashboard HTTP handler and view rendering.

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
    auth::CurrentUser,
    dashboard::charts::{DashboardChart, charts_script, charts_view, top_members_chart},
    endpoints,
    establishment::count_establishments,
    html::{
        HeadElement, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        base, summary_card,
    },
    ledger::{
        EntryDetails, EntryFilter, Period, count_entries, describe_period, latest_entry_id,
        query_entries, sum_entries, top_members_by_amount,
    },
    member::count_members,
    money::Money,
    navigation::NavBar,
    timezone::format_local,
};

/// How many members the consumption chart shows.
const TOP_MEMBERS_LIMIT: usize = 10;

/// How many of the month's entries are listed under the chart.
const RECENT_ENTRIES_LIMIT: usize = 10;

/// The state needed for displaying the dashboard page.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading the ledger.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "America/Sao_Paulo".
    pub local_timezone: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The figures shown at the top of the dashboard.
#[derive(Debug, PartialEq)]
struct DashboardTotals {
    entry_count: u32,
    entry_total: Money,
    member_count: u32,
    establishment_count: u32,
}

/// Holds all the data needed to render the dashboard.
struct DashboardData {
    totals: DashboardTotals,
    period: Period,
    top_members: Vec<(String, Money)>,
    recent_entries: Vec<EntryDetails>,
    last_entry_id: i64,
}

fn build_dashboard_data(
    now: OffsetDateTime,
    timezone: &str,
    connection: &Connection,
) -> Result<DashboardData, Error> {
    let everything = EntryFilter::default();
    let totals = DashboardTotals {
        entry_count: count_entries(&everything, timezone, connection)?,
        entry_total: sum_entries(&everything, timezone, connection)?,
        member_count: count_members(connection)?,
        establishment_count: count_establishments(connection)?,
    };

    let period = Period::current_month(now, timezone)?;
    let this_month = EntryFilter {
        period: Some(period),
        ..EntryFilter::default()
    };
    let top_members = top_members_by_amount(&this_month, TOP_MEMBERS_LIMIT, timezone, connection)?;
    let mut recent_entries = query_entries(&this_month, timezone, connection)?;
    recent_entries.truncate(RECENT_ENTRIES_LIMIT);

    Ok(DashboardData {
        totals,
        period,
        top_members,
        recent_entries,
        last_entry_id: latest_entry_id(connection)?,
    })
}

fn recent_entries_table(entries: &[EntryDetails], timezone: &str) -> Markup {
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
                        th scope="col" class=(TABLE_CELL_STYLE) { "Cooperado" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Estabelecimento" }
                        th scope="col" class="px-6 py-3 text-right" { "Valor" }
                    }
                }

                tbody id="recent-entries"
                {
                    @for details in entries {
                        tr class=(TABLE_ROW_STYLE) data-entry-id=(details.entry.id)
                        {
                            td class=(TABLE_CELL_STYLE) { (format_local(details.entry.created_at, timezone)) }
                            td class=(TABLE_CELL_STYLE) { (details.member_name) }
                            td class=(TABLE_CELL_STYLE) { (details.establishment_name) }
                            td class="px-6 py-4 text-right tabular-nums" { (details.entry.amount) }
                        }
                    }
                }
            }
        }
    }
}

fn dashboard_view(
    user: &CurrentUser,
    data: &DashboardData,
    charts: &[DashboardChart],
    timezone: &str,
) -> Markup {
    let totals = &data.totals;

    let content = html!(
        (NavBar::new(endpoints::DASHBOARD_VIEW, user.role).into_html())

        main
            id="dashboard-content"
            class=(PAGE_CONTAINER_STYLE)
            data-last-entry-id=(data.last_entry_id)
            data-last-entry-url=(endpoints::LAST_ENTRY_API)
            data-entry-info-url=(endpoints::ENTRY_INFO_API)
        {
            section class="space-y-4 w-full lg:max-w-6xl"
            {
                h1 class="text-xl font-bold" { "Dashboard" }

                div id="summary-cards" class="grid grid-cols-2 gap-4 lg:grid-cols-4"
                {
                    (summary_card("Lançamentos", &totals.entry_count.to_string()))
                    (summary_card("Total lançado", &totals.entry_total.to_string()))
                    (summary_card("Cooperados", &totals.member_count.to_string()))
                    (summary_card("Estabelecimentos", &totals.establishment_count.to_string()))
                }

                @if charts.is_empty() {
                    p class="text-center text-gray-500 dark:text-gray-400"
                    {
                        "Nenhum lançamento em " (describe_period(Some(data.period))) "."
                    }
                } @else {
                    (charts_view(charts))
                }

                h2 class="text-lg font-semibold" { "Lançamentos recentes" }

                (recent_entries_table(&data.recent_entries, timezone))
            }
        }
    );

    let scripts = if charts.is_empty() {
        Vec::new()
    } else {
        vec![
            HeadElement::ScriptLink("/static/echarts.6.0.0.min.js".to_owned()),
            charts_script(charts),
        ]
    };

    base("Dashboard", &scripts, &content)
}

/// Display the administrator's overview of the ledger.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, Error> {
    user.require_admin()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let data = build_dashboard_data(OffsetDateTime::now_utc(), &state.local_timezone, &connection)
        .inspect_err(|error| tracing::error!("could not build dashboard: {error}"))?;

    let charts = if data.top_members.is_empty() {
        Vec::new()
    } else {
        vec![DashboardChart {
            id: "top-members-chart",
            options: top_members_chart(&data.top_members, &describe_period(Some(data.period)))
                .to_string(),
        }]
    };

    Ok(dashboard_view(&user, &data, &charts, &state.local_timezone).into_response())
}
