//! Serves member photos.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    database_id::MemberId,
    image::{Image, detect_mime_type},
    member::{
        core::{MemberPhoto, get_member_photo},
        create_endpoint::MemberFormState,
    },
    not_found::get_404_not_found_response,
};

/// Read a photo saved to disk by an older release.
async fn read_photo_file(path: &str) -> Option<Image> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let mime_type = detect_mime_type(&bytes)
                .unwrap_or("application/octet-stream")
                .to_owned();
            Some(Image { bytes, mime_type })
        }
        Err(error) => {
            tracing::warn!("Could not read member photo {path}: {error}");
            None
        }
    }
}

/// A route handler that responds with a member's photo.
///
/// The photo stored in the database is preferred over a legacy file on disk.
/// Responds with 404 if the member has neither.
pub async fn get_member_photo_endpoint(
    State(state): State<MemberFormState>,
    Path(member_id): Path<MemberId>,
) -> Response {
    let photo = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_response();
            }
        };

        get_member_photo(member_id, &connection)
    };

    match photo {
        Ok(MemberPhoto::Stored(image)) => image.into_response(),
        Ok(MemberPhoto::File(path)) => match read_photo_file(&path).await {
            Some(image) => image.into_response(),
            None => get_404_not_found_response(),
        },
        Ok(MemberPhoto::Missing) | Err(Error::MemberNotFound(_)) => get_404_not_found_response(),
        Err(error) => {
            tracing::error!("Could not get photo of member {member_id}: {error}");
            error.into_response()
        }
    }
}
