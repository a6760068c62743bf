//! Defines the endpoint for registering a member.

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
    image::MultipartForm,
    member::{
        core::create_member,
        form::{PHOTO_FIELD, new_member_from_form},
    },
};

/// The state needed to create or change a member.
#[derive(Debug, Clone)]
pub struct MemberFormState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for MemberFormState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for registering a member, redirects to the member list on success.
pub async fn create_member_endpoint(
    State(state): State<MemberFormState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Response {
    if let Err(error) = user.require_admin() {
        return error.into_alert_response();
    }

    let new_member = match MultipartForm::read(multipart, PHOTO_FIELD)
        .await
        .and_then(new_member_from_form)
    {
        Ok(new_member) => new_member,
        Err(error) => return error.into_alert_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match create_member(&new_member, &connection) {
        Ok(member) => {
            tracing::info!(
                "Member {} ({}) registered with {}",
                member.id,
                member.username,
                member.credit
            );
            (
                HxRedirect(endpoints::MEMBERS_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => {
            tracing::warn!("Could not create member {}: {error}", new_member.username);
            error.into_alert_response()
        }
    }
}
