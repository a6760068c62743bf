//! Defines the endpoint administrators use to set a member's credit directly.

use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::CurrentUser,
    database_id::MemberId,
    endpoints,
    ledger::{Actor, EntryChangeState, LedgerChange, apply},
    money::Money,
};

#[derive(Debug, Deserialize)]
pub struct CreditForm {
    pub credit: String,
}

/// A route handler that replaces a member's credit without recording an
/// entry, redirects to the member list on success.
pub async fn set_member_credit_endpoint(
    State(state): State<EntryChangeState>,
    Extension(user): Extension<CurrentUser>,
    Path(member_id): Path<MemberId>,
    Form(form): Form<CreditForm>,
) -> Response {
    let credit = match Money::parse(&form.credit) {
        Ok(credit) => credit,
        Err(error) => return error.into_alert_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match apply(
        LedgerChange::AdminOverride { member_id, credit },
        Actor::from(&user),
        &state.policy,
        OffsetDateTime::now_utc(),
        &connection,
        &state.last_entry_cache,
    ) {
        Ok(_) => (
            HxRedirect(endpoints::MEMBERS_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::warn!("Could not set credit of member {member_id}: {error}");
            error.into_alert_response()
        }
    }
}
