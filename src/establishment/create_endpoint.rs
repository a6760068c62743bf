//! Defines the endpoint for registering an establishment.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    endpoints,
    establishment::{
        core::create_establishment,
        form::{LOGO_FIELD, new_establishment_from_form},
    },
    image::MultipartForm,
};

/// The state needed to create, change or delete an establishment.
#[derive(Debug, Clone)]
pub struct EstablishmentFormState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EstablishmentFormState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for registering an establishment, redirects to the
/// establishment list on success.
pub async fn create_establishment_endpoint(
    State(state): State<EstablishmentFormState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Response {
    if let Err(error) = user.require_admin() {
        return error.into_alert_response();
    }

    let new_establishment = match MultipartForm::read(multipart, LOGO_FIELD)
        .await
        .and_then(new_establishment_from_form)
    {
        Ok(new_establishment) => new_establishment,
        Err(error) => return error.into_alert_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match create_establishment(&new_establishment, &connection) {
        Ok(establishment) => {
            tracing::info!(
                "Establishment {} ({}) registered",
                establishment.id,
                establishment.username
            );
            (
                HxRedirect(endpoints::ESTABLISHMENTS_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => {
            tracing::warn!(
                "Could not create establishment {}: {error}",
                new_establishment.username
            );
            error.into_alert_response()
        }
    }
}
