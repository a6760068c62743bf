//! Coopex is a web app for managing the credit that cooperative members hold
//! with partner establishments.
//!
//! Establishments debit a member's credit by recording ledger entries
//! ("lançamentos"), administrators manage members and establishments and
//! review or export the ledger, and members can follow their own balance.
//!
//! This library provides a REST API that directly serves HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

pub mod admin_tools;
mod alert;
mod app_state;
mod auth;
mod cache;
mod dashboard;
mod database_id;
mod db;
mod endpoints;
mod establishment;
mod html;
mod image;
mod internal_server_error;
mod ledger;
mod logging;
mod member;
mod money;
mod navigation;
mod not_found;
mod routing;
mod timezone;

#[cfg(test)]
mod test_utils;

pub use app_state::{AppConfig, AppState};
pub use auth::{PasswordHash, Role, User, UserID, ValidatedPassword};
pub use cache::{Clock, LastEntryCache, SystemClock};
pub use db::initialize as initialize_db;
pub use ledger::{CreditPolicy, EditWindow};
pub use logging::logging_middleware;
pub use money::Money;
pub use routing::build_router;
pub use timezone::DEFAULT_TIMEZONE;

use crate::{
    alert::Alert, html::error_view, internal_server_error::InternalServerError,
    not_found::get_404_not_found_response,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Could not listen for ctrl+c: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate_signal) => {
                terminate_signal.recv().await;
            }
            Err(error) => {
                tracing::error!("Could not listen for the terminate signal: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The identifier or password entered at log-in did not match a user.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The auth cookie is missing from the cookie jar in the request.
    #[error("no cookies in the cookie jar :(")]
    CookieMissing,

    /// The auth token could not be serialized or deserialized.
    #[error("invalid auth token: {0}")]
    InvalidToken(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The logged in user does not have the role needed for the operation.
    #[error("the current user is not allowed to perform this operation")]
    Forbidden,

    /// A monetary amount could not be parsed or is not strictly positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A required form field was empty.
    #[error("the field \"{0}\" is required")]
    MissingField(&'static str),

    /// The member does not have enough credit to cover the requested amount.
    #[error("insufficient credit: {available} available, {requested} requested")]
    InsufficientCredit {
        /// The member's credit at the time of the request.
        available: Money,
        /// The amount that would have been debited.
        requested: Money,
    },

    /// The ledger entry can no longer be changed because its edit window has passed.
    #[error("the edit window for this ledger entry has expired")]
    EditWindowExpired,

    /// An establishment tried to change a ledger entry created by another establishment.
    #[error("the ledger entry belongs to another establishment")]
    NotEntryOwner,

    /// The member referenced by a request does not exist.
    #[error("member {0} does not exist")]
    MemberNotFound(i64),

    /// The establishment referenced by a request does not exist.
    #[error("establishment {0} does not exist")]
    EstablishmentNotFound(i64),

    /// The username is already taken by another record of the same kind.
    #[error("the username \"{0}\" is already in use")]
    DuplicateUsername(String),

    /// The email address is already used by another user.
    #[error("the email address is already in use")]
    DuplicateEmail,

    /// The record cannot be deleted while ledger entries reference it.
    #[error("the record still has ledger entries")]
    HasLedgerEntries,

    /// The multipart form could not be parsed.
    #[error("could not parse multipart form: {0}")]
    MultipartError(String),

    /// An uploaded image is too large or is not a supported image type.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The spreadsheet export could not be generated.
    #[error("could not create spreadsheet: {0}")]
    ExportError(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// A period of local dates falls outside the range of representable dates.
    #[error("the period is out of range")]
    PeriodOutOfRange,

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Tried to update a ledger entry that does not exist
    #[error("tried to update a ledger entry that is not in the database")]
    UpdateMissingEntry,

    /// Tried to delete a ledger entry that does not exist
    #[error("tried to delete a ledger entry that is not in the database")]
    DeleteMissingEntry,

    /// Tried to update a member that does not exist
    #[error("tried to update a member that is not in the database")]
    UpdateMissingMember,

    /// Tried to delete a member that does not exist
    #[error("tried to delete a member that is not in the database")]
    DeleteMissingMember,

    /// Tried to update an establishment that does not exist
    #[error("tried to update an establishment that is not in the database")]
    UpdateMissingEstablishment,

    /// Tried to delete an establishment that does not exist
    #[error("tried to delete an establishment that is not in the database")]
    DeleteMissingEstablishment,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with(".username") =>
            {
                // The offending value is not part of the SQLite message, callers that
                // know the username should map this error themselves.
                Error::DuplicateUsername(String::new())
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound | Error::MemberNotFound(_) | Error::EstablishmentNotFound(_) => {
                get_404_not_found_response()
            }
            Error::Forbidden => (
                StatusCode::FORBIDDEN,
                Html(
                    error_view(
                        "Acesso negado",
                        "403",
                        "Acesso negado.",
                        "Seu perfil não tem permissão para acessar esta página.",
                    )
                    .into_string(),
                ),
            )
                .into_response(),
            Error::NotEntryOwner => (
                StatusCode::FORBIDDEN,
                Html(
                    error_view(
                        "Acesso negado",
                        "403",
                        "Lançamento de outro estabelecimento.",
                        "Somente o estabelecimento que criou o lançamento pode alterá-lo.",
                    )
                    .into_string(),
                ),
            )
                .into_response(),
            Error::EditWindowExpired => (
                StatusCode::CONFLICT,
                Html(
                    error_view(
                        "Prazo encerrado",
                        "409",
                        "Prazo de alteração encerrado.",
                        "Este lançamento não pode mais ser alterado ou excluído.",
                    )
                    .into_string(),
                ),
            )
                .into_response(),
            Error::InvalidTimezoneError(timezone) => InternalServerError {
                description: "Fuso horário inválido",
                fix: &format!(
                    "Não foi possível carregar o fuso horário \"{timezone}\". Verifique a \
                    configuração do servidor e use um nome canônico, por exemplo \
                    \"America/Sao_Paulo\"."
                ),
            }
            .into_response(),
            Error::DatabaseLockError => InternalServerError::default().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    fn into_alert_response(self) -> Response {
        let (status, message, details) = match self {
            Error::InvalidAmount(amount) => (
                StatusCode::BAD_REQUEST,
                "Valor inválido".to_owned(),
                format!(
                    "\"{amount}\" não é um valor válido. Informe um valor maior que zero, \
                    até R$ 9.999.999.999,99 e com no máximo duas casas decimais."
                ),
            ),
            Error::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                "Campo obrigatório".to_owned(),
                format!("Preencha o campo \"{field}\"."),
            ),
            Error::InsufficientCredit {
                available,
                requested,
            } => (
                StatusCode::BAD_REQUEST,
                "Crédito insuficiente".to_owned(),
                format!(
                    "O cooperado possui {available} de crédito, mas o lançamento exige \
                    {requested}."
                ),
            ),
            Error::EditWindowExpired => (
                StatusCode::BAD_REQUEST,
                "Prazo de alteração encerrado".to_owned(),
                "Este lançamento não pode mais ser alterado ou excluído.".to_owned(),
            ),
            Error::NotEntryOwner => (
                StatusCode::FORBIDDEN,
                "Lançamento de outro estabelecimento".to_owned(),
                "Somente o estabelecimento que criou o lançamento pode alterá-lo.".to_owned(),
            ),
            Error::Forbidden => (
                StatusCode::FORBIDDEN,
                "Acesso negado".to_owned(),
                "Seu perfil não tem permissão para esta operação.".to_owned(),
            ),
            Error::MemberNotFound(id) => (
                StatusCode::NOT_FOUND,
                "Cooperado não localizado".to_owned(),
                format!("Não existe cooperado com o código {id}."),
            ),
            Error::EstablishmentNotFound(id) => (
                StatusCode::NOT_FOUND,
                "Estabelecimento não localizado".to_owned(),
                format!("Não existe estabelecimento com o código {id}."),
            ),
            Error::DuplicateUsername(username) => (
                StatusCode::CONFLICT,
                "Usuário já cadastrado".to_owned(),
                if username.is_empty() {
                    "Escolha outro nome de usuário.".to_owned()
                } else {
                    format!("O usuário \"{username}\" já existe. Escolha outro nome de usuário.")
                },
            ),
            Error::DuplicateEmail => (
                StatusCode::CONFLICT,
                "E-mail já cadastrado".to_owned(),
                "Este e-mail já está vinculado a outro acesso.".to_owned(),
            ),
            Error::HasLedgerEntries => (
                StatusCode::CONFLICT,
                "Exclusão não permitida".to_owned(),
                "Existem lançamentos vinculados a este cadastro.".to_owned(),
            ),
            Error::TooWeak(feedback) => (
                StatusCode::BAD_REQUEST,
                "Senha fraca".to_owned(),
                feedback,
            ),
            Error::InvalidImage(reason) => (
                StatusCode::BAD_REQUEST,
                "Imagem inválida".to_owned(),
                reason,
            ),
            Error::MultipartError(reason) => (
                StatusCode::BAD_REQUEST,
                "Formulário inválido".to_owned(),
                reason,
            ),
            Error::UpdateMissingEntry => (
                StatusCode::NOT_FOUND,
                "Não foi possível alterar o lançamento".to_owned(),
                "O lançamento não foi encontrado.".to_owned(),
            ),
            Error::DeleteMissingEntry => (
                StatusCode::NOT_FOUND,
                "Não foi possível excluir o lançamento".to_owned(),
                "O lançamento não foi encontrado. Atualize a página para verificar se ele \
                já foi excluído."
                    .to_owned(),
            ),
            Error::UpdateMissingMember => (
                StatusCode::NOT_FOUND,
                "Não foi possível alterar o cooperado".to_owned(),
                "O cooperado não foi encontrado.".to_owned(),
            ),
            Error::DeleteMissingMember => (
                StatusCode::NOT_FOUND,
                "Não foi possível excluir o cooperado".to_owned(),
                "O cooperado não foi encontrado. Atualize a página para verificar se ele \
                já foi excluído."
                    .to_owned(),
            ),
            Error::UpdateMissingEstablishment => (
                StatusCode::NOT_FOUND,
                "Não foi possível alterar o estabelecimento".to_owned(),
                "O estabelecimento não foi encontrado.".to_owned(),
            ),
            Error::DeleteMissingEstablishment => (
                StatusCode::NOT_FOUND,
                "Não foi possível excluir o estabelecimento".to_owned(),
                "O estabelecimento não foi encontrado. Atualize a página para verificar se \
                ele já foi excluído."
                    .to_owned(),
            ),
            Error::InvalidTimezoneError(timezone) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Fuso horário inválido".to_owned(),
                format!(
                    "Não foi possível carregar o fuso horário \"{timezone}\". Verifique a \
                    configuração do servidor."
                ),
            ),
            error => {
                tracing::error!("An unexpected error occurred: {error}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Algo deu errado".to_owned(),
                    "Ocorreu um erro inesperado, verifique os logs do servidor.".to_owned(),
                )
            }
        };

        (status, Alert::Error { message, details }.into_html()).into_response()
    }
}
