//! Member photos and establishment logos: reading uploads from multipart forms,
//! checking them and serving them back.

use std::collections::HashMap;

use axum::{
    extract::Multipart,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::Error;

/// The largest image accepted for upload, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// The request body limit for routes that accept an image upload.
///
/// Leaves room for the other form fields and the multipart framing.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 256 * 1024;

/// An image stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Image {
    /// Check an uploaded file and work out its MIME type from its contents.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidImage] if the file is larger than
    /// [MAX_IMAGE_BYTES] or is not a JPEG, PNG, WebP or GIF image.
    pub fn from_upload(bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(Error::InvalidImage(format!(
                "A imagem tem {:.1} MB, o limite é {} MB.",
                bytes.len() as f64 / (1024.0 * 1024.0),
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }

        let mime_type = detect_mime_type(&bytes).ok_or_else(|| {
            Error::InvalidImage("Envie uma imagem JPEG, PNG, WebP ou GIF.".to_owned())
        })?;

        Ok(Self {
            bytes,
            mime_type: mime_type.to_owned(),
        })
    }
}

impl IntoResponse for Image {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, self.mime_type),
                (header::CACHE_CONTROL, "private, max-age=300".to_owned()),
            ],
            self.bytes,
        )
            .into_response()
    }
}

/// Identify an image by its leading bytes.
pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

/// The text fields and the optional image of a submitted multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    /// The uploaded image, if the user picked a file.
    pub image: Option<Image>,
}

impl MultipartForm {
    /// Read every field of `multipart`, treating the field named `image_field` as an image upload.
    ///
    /// An image field with no file selected (empty content) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [Error::MultipartError] if the form cannot be read, or
    /// [Error::InvalidImage] if the uploaded file is not an acceptable image.
    pub async fn read(mut multipart: Multipart, image_field: &str) -> Result<Self, Error> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|error| {
            tracing::error!("Could not read multipart field: {error}");
            Error::MultipartError(error.body_text())
        })? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == image_field {
                let bytes = field.bytes().await.map_err(|error| {
                    tracing::error!("Could not read uploaded image: {error}");
                    Error::MultipartError(error.body_text())
                })?;

                if !bytes.is_empty() {
                    form.image = Some(Image::from_upload(bytes.to_vec())?);
                }
            } else {
                let text = field.text().await.map_err(|error| {
                    tracing::error!("Could not read form field {name}: {error}");
                    Error::MultipartError(error.body_text())
                })?;

                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// The trimmed value of a text field, `None` when missing or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// The trimmed value of a required text field.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingField] with `label` when the field is missing or blank.
    pub fn required_text(&self, name: &str, label: &'static str) -> Result<&str, Error> {
        self.text(name).ok_or(Error::MissingField(label))
    }
}
