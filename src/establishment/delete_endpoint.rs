use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    alert::Alert,
    auth::CurrentUser,
    database_id::EstablishmentId,
    establishment::{core::delete_establishment, create_endpoint::EstablishmentFormState},
};

/// A route handler for deleting an establishment, responds with an alert.
pub async fn delete_establishment_endpoint(
    State(state): State<EstablishmentFormState>,
    Extension(user): Extension<CurrentUser>,
    Path(establishment_id): Path<EstablishmentId>,
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

    match delete_establishment(establishment_id, &connection) {
        // The status code has to be 200 OK or HTMX will not delete the table row.
        Ok(()) => {
            tracing::info!("Establishment {establishment_id} deleted");
            Alert::SuccessSimple {
                message: "Estabelecimento excluído.".to_owned(),
            }
            .into_response()
        }
        Err(error) => {
            tracing::warn!("Could not delete establishment {establishment_id}: {error}");
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
    use time::OffsetDateTime;

    use crate::{
        establishment::{core::list_establishments, create_endpoint::EstablishmentFormState},
        money::Money,
        test_utils::{
            admin_user, assert_status_ok, establishment_user, get_test_connection, insert_entry,
            seed_establishment, seed_member,
        },
    };

    use super::delete_establishment_endpoint;

    fn state_with_establishment() -> (EstablishmentFormState, i64) {
        let connection = get_test_connection();
        let id = seed_establishment("Padaria", "padaria", &connection);

        (
            EstablishmentFormState {
                db_connection: Arc::new(Mutex::new(connection)),
            },
            id,
        )
    }

    #[tokio::test]
    async fn deletes_establishment() {
        let (state, id) = state_with_establishment();

        let response =
            delete_establishment_endpoint(State(state.clone()), Extension(admin_user()), Path(id))
                .await;

        assert_status_ok(&response);
        assert!(
            list_establishments(&state.db_connection.lock().unwrap())
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn establishment_with_entries_is_kept() {
        let (state, id) = state_with_establishment();
        {
            let connection = state.db_connection.lock().unwrap();
            let member = seed_member("Maria", "maria", Money::ZERO, &connection);
            insert_entry(
                OffsetDateTime::now_utc(),
                Money::from_reais(3),
                member,
                id,
                &connection,
            );
        }

        let response =
            delete_establishment_endpoint(State(state.clone()), Extension(admin_user()), Path(id))
                .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            list_establishments(&state.db_connection.lock().unwrap())
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn establishment_cannot_delete_itself() {
        let (state, id) = state_with_establishment();

        let response =
            delete_establishment_endpoint(State(state), Extension(establishment_user(id)), Path(id))
                .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
