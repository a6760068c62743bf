//! Credentials: the user table, roles, and the admin table.
//!
//! A credential (`user` row) belongs to exactly one administrator,
//! establishment or member record through `role` and `link_id`. The link is a
//! back-reference: deleting the linked record deletes its credential, never
//! the other way around.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash, database_id::DatabaseId, endpoints};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The kind of actor a credential belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages members and establishments, sees the whole ledger.
    Admin,
    /// Records ledger entries against members' credit.
    Establishment,
    /// Holds credit and can follow their own entries.
    Member,
}

impl Role {
    /// The value stored in the `role` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Establishment => "establishment",
            Role::Member => "member",
        }
    }

    /// Parse the value stored in the `role` column.
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "establishment" => Some(Role::Establishment),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    /// The page a user with this role lands on after logging in.
    pub fn home_endpoint(&self) -> &'static str {
        match self {
            Role::Admin => endpoints::DASHBOARD_VIEW,
            Role::Establishment => endpoints::ESTABLISHMENT_PANEL_VIEW,
            Role::Member => endpoints::MEMBER_PANEL_VIEW,
        }
    }

    /// The name of the role shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrador",
            Role::Establishment => "Estabelecimento",
            Role::Member => "Cooperado",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential that can log in to the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The lower-cased email address, if the user logs in with one.
    pub email: Option<String>,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The kind of record the credential belongs to.
    pub role: Role,
    /// The ID of the admin, establishment or member record.
    pub link_id: DatabaseId,
}

/// Create the admin table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_admin_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS admin (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                username TEXT NOT NULL UNIQUE
                )",
        (),
    )?;

    Ok(())
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT UNIQUE,
                password TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('admin', 'establishment', 'member')),
                link_id INTEGER NOT NULL,
                UNIQUE (role, link_id)
                )",
        (),
    )?;

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_role: String = row.get(3)?;
    let role = Role::from_db(&raw_role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown role {raw_role:?}").into(),
        )
    })?;
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        role,
        link_id: row.get(4)?,
    })
}

fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();

    (!email.is_empty()).then_some(email)
}

/// Create or replace the credential for the record `link_id` of kind `role`.
///
/// An existing credential for the same record keeps its ID and has its
/// password (and email, when `email` is given) replaced.
///
/// # Errors
///
/// Returns [Error::DuplicateEmail] if another user already has `email`, or
/// [Error::SqlError] if some other SQL error occurred.
pub fn upsert_user(
    role: Role,
    link_id: DatabaseId,
    email: Option<&str>,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    let email = email.and_then(normalize_email);

    connection
        .prepare(
            "INSERT INTO user (email, password, role, link_id) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (role, link_id) DO UPDATE SET
                password = excluded.password,
                email = COALESCE(excluded.email, user.email)
             RETURNING id, email, password, role, link_id",
        )?
        .query_row(
            params![email, password_hash.to_string(), role.as_str(), link_id],
            map_user_row,
        )
        .map_err(Error::from)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, password, role, link_id FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(Error::from)
}

/// Get the credential linked to a record, if it has one.
pub fn get_user_for_link(
    role: Role,
    link_id: DatabaseId,
    connection: &Connection,
) -> Result<Option<User>, Error> {
    connection
        .prepare(
            "SELECT id, email, password, role, link_id FROM user WHERE role = ?1 AND link_id = ?2",
        )?
        .query_row(params![role.as_str(), link_id], map_user_row)
        .optional()
        .map_err(Error::from)
}

/// Delete the credential linked to a record. Returns the number of rows deleted.
pub fn delete_user_for_link(
    role: Role,
    link_id: DatabaseId,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "DELETE FROM user WHERE role = ?1 AND link_id = ?2",
            params![role.as_str(), link_id],
        )
        .map_err(Error::from)
}

/// Change the email of the credential linked to a record, if it has one.
///
/// A blank `email` removes the address. Returns the number of rows updated.
///
/// # Errors
///
/// Returns [Error::DuplicateEmail] if another user already has `email`.
pub fn set_email_for_link(
    role: Role,
    link_id: DatabaseId,
    email: Option<&str>,
    connection: &Connection,
) -> Result<usize, Error> {
    let email = email.and_then(normalize_email);

    connection
        .execute(
            "UPDATE user SET email = ?1 WHERE role = ?2 AND link_id = ?3",
            params![email, role.as_str(), link_id],
        )
        .map_err(Error::from)
}

/// Find the credential for the identifier typed at log-in.
///
/// The identifier is matched, in order, against user emails
/// (case-insensitive), establishment usernames, member usernames and admin
/// usernames. The first match wins. When `role` is given, only the emails of
/// users with that role and the usernames of that role's table are checked.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] if no credential matches.
pub fn find_user_by_identifier(
    identifier: &str,
    role: Option<Role>,
    connection: &Connection,
) -> Result<User, Error> {
    let identifier = identifier.trim();

    if identifier.is_empty() {
        return Err(Error::InvalidCredentials);
    }

    if let Some(email) = normalize_email(identifier) {
        let user = connection
            .prepare(
                "SELECT id, email, password, role, link_id FROM user
                 WHERE email = ?1 AND (?2 IS NULL OR role = ?2)",
            )?
            .query_row(params![email, role.map(|role| role.as_str())], map_user_row)
            .optional()?;

        if let Some(user) = user {
            return Ok(user);
        }
    }

    let probe_order = [Role::Establishment, Role::Member, Role::Admin];

    for probe_role in probe_order
        .into_iter()
        .filter(|probe_role| role.is_none_or(|role| role == *probe_role))
    {
        let table = match probe_role {
            Role::Admin => "admin",
            Role::Establishment => "establishment",
            Role::Member => "member",
        };

        let user = connection
            .prepare(&format!(
                "SELECT u.id, u.email, u.password, u.role, u.link_id
                 FROM user u
                 INNER JOIN \"{table}\" r ON u.link_id = r.id
                 WHERE u.role = ?1 AND r.username = ?2"
            ))?
            .query_row(params![probe_role.as_str(), identifier], map_user_row)
            .optional()?;

        if let Some(user) = user {
            return Ok(user);
        }
    }

    Err(Error::InvalidCredentials)
}

/// Replace the password of a user.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not refer to a user.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        params![password_hash.to_string(), user_id.as_i64()],
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// Create an administrator and its credential.
///
/// # Errors
///
/// Returns [Error::DuplicateUsername] if the username is taken by another
/// administrator, [Error::DuplicateEmail] if the email is in use, or
/// [Error::SqlError] if some other SQL error occurred.
pub fn create_admin(
    name: &str,
    username: &str,
    email: Option<&str>,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    let transaction = connection.unchecked_transaction()?;

    transaction
        .execute(
            "INSERT INTO admin (name, username) VALUES (?1, ?2)",
            params![name.trim(), username.trim()],
        )
        .map_err(|error| match Error::from(error) {
            Error::DuplicateUsername(_) => Error::DuplicateUsername(username.trim().to_owned()),
            error => error,
        })?;
    let admin_id = transaction.last_insert_rowid();
    let user = upsert_user(Role::Admin, admin_id, email, password_hash, &transaction)?;

    transaction.commit()?;

    Ok(user)
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(Error::from)
}
