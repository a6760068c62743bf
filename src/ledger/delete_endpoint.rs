//! Defines the endpoint for deleting a ledger entry.

use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use time::OffsetDateTime;

use crate::{
    Error,
    alert::Alert,
    auth::CurrentUser,
    database_id::EntryId,
    ledger::{
        create_endpoint::EntryChangeState,
        mutation::{Actor, LedgerChange, LedgerOutcome, apply},
    },
};

/// A route handler for deleting a ledger entry, responds with an alert.
///
/// The entry's amount is credited back to the member.
pub async fn delete_entry_endpoint(
    State(state): State<EntryChangeState>,
    Extension(user): Extension<CurrentUser>,
    Path(entry_id): Path<EntryId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match apply(
        LedgerChange::Delete { entry_id },
        Actor::from(&user),
        &state.policy,
        OffsetDateTime::now_utc(),
        &connection,
        &state.last_entry_cache,
    ) {
        // The status code has to be 200 OK or HTMX will not delete the table row.
        Ok(LedgerOutcome::Deleted(entry)) => Alert::SuccessSimple {
            message: format!(
                "Lançamento {} excluído, {} devolvidos ao cooperado.",
                entry.order_number, entry.amount
            ),
        }
        .into_response(),
        Ok(outcome) => {
            tracing::error!("Deleting entry {entry_id} gave unexpected outcome {outcome:?}");
            Error::DeleteMissingEntry.into_alert_response()
        }
        Err(error) => {
            tracing::warn!("Could not delete ledger entry {entry_id}: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
    };
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        cache::LastEntryCache,
        ledger::{core::get_entry, create_endpoint::EntryChangeState, mutation::LedgerPolicy},
        member::get_member,
        money::Money,
        test_utils::{
            admin_user, assert_status_ok, establishment_user, get_test_connection, insert_entry,
            member_user, seed_establishment, seed_member,
        },
    };

    use super::delete_entry_endpoint;

    fn state_with_entry(age: Duration) -> (EntryChangeState, i64, i64, i64) {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::from_reais(5), &connection);
        let establishment = seed_establishment("Padaria", "padaria", &connection);
        let entry = insert_entry(
            OffsetDateTime::now_utc() - age,
            Money::from_reais(10),
            member,
            establishment,
            &connection,
        );

        let state = EntryChangeState {
            db_connection: Arc::new(Mutex::new(connection)),
            policy: LedgerPolicy::default(),
            last_entry_cache: Arc::new(LastEntryCache::default()),
        };

        (state, member, establishment, entry)
    }

    #[tokio::test]
    async fn owner_deletes_and_credit_is_restored() {
        let (state, member, establishment, entry) = state_with_entry(Duration::minutes(1));

        let response = delete_entry_endpoint(
            State(state.clone()),
            Extension(establishment_user(establishment)),
            Path(entry),
        )
        .await;

        assert_status_ok(&response);
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(get_entry(entry, &connection), Err(Error::NotFound));
        assert_eq!(
            get_member(member, &connection).unwrap().credit,
            Money::from_reais(15)
        );
    }

    #[tokio::test]
    async fn admin_deletes_after_window() {
        let (state, member, _, entry) = state_with_entry(Duration::days(3));

        let response =
            delete_entry_endpoint(State(state.clone()), Extension(admin_user()), Path(entry)).await;

        assert_status_ok(&response);
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(
            get_member(member, &connection).unwrap().credit,
            Money::from_reais(15)
        );
    }

    #[tokio::test]
    async fn owner_cannot_delete_after_window() {
        let (state, member, establishment, entry) = state_with_entry(Duration::hours(11));

        let response = delete_entry_endpoint(
            State(state.clone()),
            Extension(establishment_user(establishment)),
            Path(entry),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let connection = state.db_connection.lock().unwrap();
        assert!(get_entry(entry, &connection).is_ok());
        assert_eq!(
            get_member(member, &connection).unwrap().credit,
            Money::from_reais(5)
        );
    }

    #[tokio::test]
    async fn member_cannot_delete() {
        let (state, member, _, entry) = state_with_entry(Duration::minutes(1));

        let response =
            delete_entry_endpoint(State(state), Extension(member_user(member)), Path(entry)).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_entry_returns_not_found() {
        let (state, _, _, _) = state_with_entry(Duration::minutes(1));

        let response =
            delete_entry_endpoint(State(state), Extension(admin_user()), Path(999)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
