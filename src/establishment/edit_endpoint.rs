use axum::{
    Extension,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;

use crate::{
    Error,
    auth::CurrentUser,
    database_id::EstablishmentId,
    endpoints,
    establishment::{
        core::update_establishment,
        create_endpoint::EstablishmentFormState,
        form::{LOGO_FIELD, establishment_update_from_form},
    },
    image::MultipartForm,
};

/// A route handler for changing an establishment, redirects to the
/// establishment list on success.
pub async fn edit_establishment_endpoint(
    State(state): State<EstablishmentFormState>,
    Extension(user): Extension<CurrentUser>,
    Path(establishment_id): Path<EstablishmentId>,
    multipart: Multipart,
) -> Response {
    if let Err(error) = user.require_admin() {
        return error.into_alert_response();
    }

    let update = match MultipartForm::read(multipart, LOGO_FIELD)
        .await
        .and_then(establishment_update_from_form)
    {
        Ok(update) => update,
        Err(error) => return error.into_alert_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match update_establishment(establishment_id, &update, &connection) {
        Ok(_) => {
            if update.password_hash.is_some() {
                tracing::info!("Password of establishment {establishment_id} was reset");
            }
            (
                HxRedirect(endpoints::ESTABLISHMENTS_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => {
            tracing::warn!("Could not update establishment {establishment_id}: {error}");
            error.into_alert_response()
        }
    }
}
