use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    database_id::EstablishmentId,
    establishment::{core::get_establishment_logo, create_endpoint::EstablishmentFormState},
    not_found::get_404_not_found_response,
};

/// A route handler that responds with an establishment's logo, or 404 if it has none.
pub async fn get_establishment_logo_endpoint(
    State(state): State<EstablishmentFormState>,
    Path(establishment_id): Path<EstablishmentId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_establishment_logo(establishment_id, &connection) {
        Ok(Some(image)) => image.into_response(),
        Ok(None) | Err(Error::EstablishmentNotFound(_)) => get_404_not_found_response(),
        Err(error) => {
            tracing::error!("Could not get logo of establishment {establishment_id}: {error}");
            error.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::StatusCode,
    };
    use rusqlite::params;

    use crate::{
        establishment::create_endpoint::EstablishmentFormState,
        image::test_multipart::PNG_BYTES,
        test_utils::{
            assert_content_type, assert_status_ok, get_test_connection, seed_establishment,
        },
    };

    use super::get_establishment_logo_endpoint;

    #[tokio::test]
    async fn serves_stored_logo() {
        let connection = get_test_connection();
        let id = seed_establishment("Padaria", "padaria", &connection);
        connection
            .execute(
                "UPDATE establishment SET logo = ?1, logo_mime = 'image/png' WHERE id = ?2",
                params![PNG_BYTES, id],
            )
            .unwrap();
        let state = EstablishmentFormState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = get_establishment_logo_endpoint(State(state), Path(id)).await;

        assert_status_ok(&response);
        assert_content_type(&response, "image/png");
    }

    #[tokio::test]
    async fn no_logo_is_not_found() {
        let connection = get_test_connection();
        let id = seed_establishment("Padaria", "padaria", &connection);
        let state = EstablishmentFormState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = get_establishment_logo_endpoint(State(state.clone()), Path(id)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get_establishment_logo_endpoint(State(state), Path(id + 1)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
