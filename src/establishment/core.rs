use rusqlite::{Connection, OptionalExtension, Row, params};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{PasswordHash, Role, delete_user_for_link, set_email_for_link, upsert_user},
    database_id::EstablishmentId,
    db::get_optional_timestamp,
    image::Image,
};

/// A partner business that records ledger entries against members' credit.
#[derive(Debug, Clone, PartialEq)]
pub struct Establishment {
    pub id: EstablishmentId,
    pub name: String,
    /// The name the establishment logs in with.
    pub username: String,
    pub has_logo: bool,
    pub created_at: Option<OffsetDateTime>,
}

/// The data needed to register an establishment.
///
/// Every establishment logs in, so unlike members a password is required.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEstablishment {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: PasswordHash,
    pub logo: Option<Image>,
}

/// The changes an administrator can make to an establishment.
#[derive(Debug, Clone, PartialEq)]
pub struct EstablishmentUpdate {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    /// Resets the establishment's password when set.
    pub password_hash: Option<PasswordHash>,
    /// Replaces the logo. `None` keeps the current one.
    pub logo: Option<Image>,
}

pub fn create_establishment_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS establishment (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            logo BLOB,
            logo_mime TEXT,
            created_at INTEGER
        )",
        (),
    )?;

    Ok(())
}

const ESTABLISHMENT_COLUMNS: &str = "id, name, username, logo IS NOT NULL, created_at";

fn map_establishment_row(row: &Row) -> Result<Establishment, rusqlite::Error> {
    Ok(Establishment {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        has_logo: row.get(3)?,
        created_at: get_optional_timestamp(row, 4)?,
    })
}

fn require_name_and_username(name: &str, username: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::MissingField("Nome"));
    }

    if username.trim().is_empty() {
        return Err(Error::MissingField("Usuário"));
    }

    Ok(())
}

fn map_duplicate_username(username: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |error| match Error::from(error) {
        Error::DuplicateUsername(_) => Error::DuplicateUsername(username.to_owned()),
        error => error,
    }
}

/// Register an establishment and its credential.
///
/// # Errors
///
/// Returns [Error::MissingField] for a blank name or username,
/// [Error::DuplicateUsername] or [Error::DuplicateEmail] on conflicts, or
/// [Error::SqlError] if some other SQL error occurred.
pub fn create_establishment(
    new_establishment: &NewEstablishment,
    connection: &Connection,
) -> Result<Establishment, Error> {
    require_name_and_username(&new_establishment.name, &new_establishment.username)?;

    let username = new_establishment.username.trim();
    let (logo, logo_mime) = match &new_establishment.logo {
        Some(image) => (Some(image.bytes.as_slice()), Some(image.mime_type.as_str())),
        None => (None, None),
    };

    let transaction = connection.unchecked_transaction()?;

    transaction
        .execute(
            "INSERT INTO establishment (name, username, logo, logo_mime, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new_establishment.name.trim(),
                username,
                logo,
                logo_mime,
                OffsetDateTime::now_utc().unix_timestamp()
            ],
        )
        .map_err(map_duplicate_username(username))?;
    let id = transaction.last_insert_rowid();

    upsert_user(
        Role::Establishment,
        id,
        new_establishment.email.as_deref(),
        &new_establishment.password_hash,
        &transaction,
    )?;

    let establishment = get_establishment(id, &transaction)?;
    transaction.commit()?;

    Ok(establishment)
}

/// Get an establishment by ID.
///
/// # Errors
///
/// Returns [Error::EstablishmentNotFound] if there is no establishment with `id`.
pub fn get_establishment(
    id: EstablishmentId,
    connection: &Connection,
) -> Result<Establishment, Error> {
    connection
        .prepare(&format!(
            "SELECT {ESTABLISHMENT_COLUMNS} FROM establishment WHERE id = ?1"
        ))?
        .query_row([id], map_establishment_row)
        .map_err(|error| match Error::from(error) {
            Error::NotFound => Error::EstablishmentNotFound(id),
            error => error,
        })
}

/// Get every establishment ordered by name.
pub fn list_establishments(connection: &Connection) -> Result<Vec<Establishment>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ESTABLISHMENT_COLUMNS} FROM establishment ORDER BY name COLLATE NOCASE ASC, id ASC"
        ))?
        .query_map([], map_establishment_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

pub fn count_establishments(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM establishment", [], |row| row.get(0))
        .map_err(Error::from)
}

/// Update an establishment's details, resetting its password when a new one is given.
///
/// # Errors
///
/// Returns [Error::UpdateMissingEstablishment] if there is no establishment
/// with `id`, [Error::DuplicateUsername] or [Error::DuplicateEmail] on conflicts.
pub fn update_establishment(
    id: EstablishmentId,
    update: &EstablishmentUpdate,
    connection: &Connection,
) -> Result<Establishment, Error> {
    require_name_and_username(&update.name, &update.username)?;

    let username = update.username.trim();
    let transaction = connection.unchecked_transaction()?;

    let rows_affected = transaction
        .execute(
            "UPDATE establishment SET name = ?1, username = ?2 WHERE id = ?3",
            params![update.name.trim(), username, id],
        )
        .map_err(map_duplicate_username(username))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingEstablishment);
    }

    if let Some(image) = &update.logo {
        transaction.execute(
            "UPDATE establishment SET logo = ?1, logo_mime = ?2 WHERE id = ?3",
            params![image.bytes, image.mime_type, id],
        )?;
    }

    match &update.password_hash {
        Some(password_hash) => {
            upsert_user(
                Role::Establishment,
                id,
                update.email.as_deref(),
                password_hash,
                &transaction,
            )?;
        }
        None => {
            set_email_for_link(Role::Establishment, id, update.email.as_deref(), &transaction)?;
        }
    }

    let establishment = get_establishment(id, &transaction)?;
    transaction.commit()?;

    Ok(establishment)
}

/// Delete an establishment and its credential.
///
/// # Errors
///
/// Returns [Error::HasLedgerEntries] if entries still refer to the
/// establishment, or [Error::DeleteMissingEstablishment] if there is no
/// establishment with `id`.
pub fn delete_establishment(id: EstablishmentId, connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    let has_entries: bool = transaction.query_row(
        "SELECT EXISTS (SELECT 1 FROM entry WHERE establishment_id = ?1)",
        [id],
        |row| row.get(0),
    )?;

    if has_entries {
        return Err(Error::HasLedgerEntries);
    }

    let rows_affected = transaction.execute("DELETE FROM establishment WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingEstablishment);
    }

    delete_user_for_link(Role::Establishment, id, &transaction)?;
    transaction.commit()?;

    Ok(())
}

/// Get an establishment's logo, `None` if it has none.
///
/// # Errors
///
/// Returns [Error::EstablishmentNotFound] if there is no establishment with `id`.
pub fn get_establishment_logo(
    id: EstablishmentId,
    connection: &Connection,
) -> Result<Option<Image>, Error> {
    let (bytes, mime_type): (Option<Vec<u8>>, Option<String>) = connection
        .query_row(
            "SELECT logo, logo_mime FROM establishment WHERE id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or(Error::EstablishmentNotFound(id))?;

    Ok(bytes.filter(|bytes| !bytes.is_empty()).map(|bytes| Image {
        mime_type: mime_type.unwrap_or_else(|| "image/png".to_owned()),
        bytes,
    }))
}
