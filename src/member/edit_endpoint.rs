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
    database_id::MemberId,
    endpoints,
    image::MultipartForm,
    member::{
        core::update_member,
        create_endpoint::MemberFormState,
        form::{PHOTO_FIELD, member_update_from_form},
    },
};

/// A route handler for changing a member's details, redirects to the member
/// list on success.
pub async fn edit_member_endpoint(
    State(state): State<MemberFormState>,
    Extension(user): Extension<CurrentUser>,
    Path(member_id): Path<MemberId>,
    multipart: Multipart,
) -> Response {
    if let Err(error) = user.require_admin() {
        return error.into_alert_response();
    }

    let update = match MultipartForm::read(multipart, PHOTO_FIELD)
        .await
        .and_then(member_update_from_form)
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

    match update_member(member_id, &update, &connection) {
        Ok(_) => (
            HxRedirect(endpoints::MEMBERS_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::warn!("Could not update member {member_id}: {error}");
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

    use crate::{
        endpoints,
        image::test_multipart::{Part, must_make_multipart},
        member::{core::get_member, create_endpoint::MemberFormState},
        money::Money,
        test_utils::{admin_user, assert_hx_redirect, get_test_connection, seed_member},
    };

    use super::edit_member_endpoint;

    #[tokio::test]
    async fn updates_details_and_keeps_credit() {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::from_reais(30), &connection);
        let state = MemberFormState {
            db_connection: Arc::new(Mutex::new(connection)),
        };
        let multipart = must_make_multipart(&[
            Part::Text("name", "Maria Souza"),
            Part::Text("username", "maria.souza"),
        ])
        .await;

        let response = edit_member_endpoint(
            State(state.clone()),
            Extension(admin_user()),
            Path(member),
            multipart,
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::MEMBERS_VIEW);
        let connection = state.db_connection.lock().unwrap();
        let got = get_member(member, &connection).unwrap();
        assert_eq!(got.name, "Maria Souza");
        assert_eq!(got.username, "maria.souza");
        assert_eq!(got.credit, Money::from_reais(30));
    }

    #[tokio::test]
    async fn missing_member_is_not_found() {
        let state = MemberFormState {
            db_connection: Arc::new(Mutex::new(get_test_connection())),
        };
        let multipart = must_make_multipart(&[
            Part::Text("name", "Maria"),
            Part::Text("username", "maria"),
        ])
        .await;

        let response =
            edit_member_endpoint(State(state), Extension(admin_user()), Path(42), multipart).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
