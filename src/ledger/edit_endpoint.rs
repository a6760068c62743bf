//! Defines the endpoint for correcting a ledger entry.

use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::CurrentUser,
    database_id::EntryId,
    endpoints,
    ledger::{
        create_endpoint::EntryChangeState,
        form::EntryFormData,
        mutation::{Actor, EntryUpdate, LedgerChange, apply},
    },
};

/// A route handler for updating a ledger entry, redirects to the ledger
/// listing on success.
///
/// The member's credit is adjusted by the difference between the new and the
/// old amount.
pub async fn edit_entry_endpoint(
    State(state): State<EntryChangeState>,
    Extension(user): Extension<CurrentUser>,
    Path(entry_id): Path<EntryId>,
    Form(form): Form<EntryFormData>,
) -> Response {
    let amount = match form.parse_amount() {
        Ok(amount) => amount,
        Err(error) => return error.into_alert_response(),
    };

    let update = EntryUpdate {
        amount,
        order_number: form.order_number,
        description: form.description,
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match apply(
        LedgerChange::Edit { entry_id, update },
        Actor::from(&user),
        &state.policy,
        OffsetDateTime::now_utc(),
        &connection,
        &state.last_entry_cache,
    ) {
        Ok(_) => (
            HxRedirect(endpoints::ENTRIES_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::warn!("Could not update ledger entry {entry_id}: {error}");
            error.into_alert_response()
        }
    }
}
