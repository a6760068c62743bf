//! JSON endpoints polled by the browser to announce new ledger entries.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppState, Error,
    auth::{CurrentUser, Role},
    cache::LastEntryCache,
    ledger::core::{EntryDetails, get_entry_details, latest_entry_id},
    timezone::format_local,
};

/// The state needed for the ledger JSON endpoints.
#[derive(Debug, Clone)]
pub struct LedgerApiState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub last_entry_cache: Arc<LastEntryCache>,
    pub local_timezone: String,
}

impl FromRef<AppState> for LedgerApiState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            last_entry_cache: state.last_entry_cache.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct LastEntry {
    last_id: i64,
}

/// Responds with the ID of the newest entry, zero if there is none.
pub async fn get_last_entry_id(State(state): State<LedgerApiState>) -> Response {
    let last_id = state.last_entry_cache.get_or_load(|| {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        latest_entry_id(&connection)
    });

    match last_id {
        Ok(last_id) => Json(LastEntry { last_id }).into_response(),
        Err(error) => {
            tracing::error!("could not get the latest entry ID: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EntryInfoQuery {
    #[serde(default)]
    id: Option<String>,
}

/// The summary shown in the new entry notification.
#[derive(Debug, PartialEq, Serialize)]
struct EntryInfo {
    ok: bool,
    id: i64,
    cooperado: String,
    cooperado_nome: String,
    estabelecimento: String,
    valor: f64,
    data: String,
}

fn is_visible_to(details: &EntryDetails, user: &CurrentUser) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Establishment => details.entry.establishment_id == user.link_id,
        Role::Member => details.entry.member_id == user.link_id,
    }
}

fn not_ok(status: StatusCode) -> Response {
    (status, Json(json!({ "ok": false }))).into_response()
}

/// Responds with a summary of the entry named by the `id` query parameter.
///
/// Responds with 400 if the ID is not a number and 404 if the entry does not
/// exist or the user may not see it.
pub async fn get_entry_info(
    State(state): State<LedgerApiState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<EntryInfoQuery>,
) -> Response {
    let Some(entry_id) = query
        .id
        .as_deref()
        .and_then(|id| id.trim().parse::<i64>().ok())
    else {
        return not_ok(StatusCode::BAD_REQUEST);
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return not_ok(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let details = match get_entry_details(entry_id, &connection) {
        Ok(details) if is_visible_to(&details, &user) => details,
        Ok(_) | Err(Error::NotFound) => return not_ok(StatusCode::NOT_FOUND),
        Err(error) => {
            tracing::error!("could not get ledger entry {entry_id}: {error}");
            return not_ok(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Json(EntryInfo {
        ok: true,
        id: details.entry.id,
        cooperado: details.member_name.clone(),
        cooperado_nome: details.member_name,
        estabelecimento: details.establishment_name,
        valor: details.entry.amount.as_f64(),
        data: format_local(details.entry.created_at, &state.local_timezone),
    })
    .into_response()
}
