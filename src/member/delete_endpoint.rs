use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    alert::Alert,
    auth::CurrentUser,
    database_id::MemberId,
    member::{core::delete_member, create_endpoint::MemberFormState},
};

/// A route handler for deleting a member, responds with an alert.
///
/// Members with ledger entries cannot be deleted.
pub async fn delete_member_endpoint(
    State(state): State<MemberFormState>,
    Extension(user): Extension<CurrentUser>,
    Path(member_id): Path<MemberId>,
) -> Response {
    if let Err(error) = user.require_admin() {
        return error.into_alert_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_member(member_id, &connection) {
        // The status code has to be 200 OK or HTMX will not delete the table row.
        Ok(()) => {
            tracing::info!("Member {member_id} deleted");
            Alert::SuccessSimple {
                message: "Cooperado excluído.".to_owned(),
            }
            .into_response()
        }
        Err(error) => {
            tracing::warn!("Could not delete member {member_id}: {error}");
            error.into_alert_response()
        }
    }
}
