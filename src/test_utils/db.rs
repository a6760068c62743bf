use std::sync::{Arc, Mutex};

use axum_extra::extract::cookie::Key;
use rusqlite::{Connection, params};
use time::OffsetDateTime;

use crate::{
    AppConfig, AppState,
    auth::{CurrentUser, Role, UserID},
    cache::LastEntryCache,
    db::initialize,
    money::Money,
};

/// The timezone used by handler tests.
pub(crate) const TEST_TIMEZONE: &str = "America/Sao_Paulo";

/// An in-memory database with every table created.
#[track_caller]
pub(crate) fn get_test_connection() -> Connection {
    let connection =
        Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");
    initialize(&connection, TEST_TIMEZONE).expect("Could not initialise database");
    connection
}

/// The application state wrapped around an in-memory database.
#[track_caller]
pub(crate) fn get_test_app_state() -> AppState {
    let connection = get_test_connection();
    let config = AppConfig {
        local_timezone: TEST_TIMEZONE.to_owned(),
        ..AppConfig::default()
    };

    AppState {
        cookie_key: Key::generate(),
        cookie_duration: time::Duration::minutes(5),
        local_timezone: config.local_timezone,
        edit_window: config.edit_window,
        credit_policy: config.credit_policy,
        db_connection: Arc::new(Mutex::new(connection)),
        last_entry_cache: Arc::new(LastEntryCache::default()),
    }
}

/// Insert a member without a credential and return its ID.
#[track_caller]
pub(crate) fn seed_member(
    name: &str,
    username: &str,
    credit: Money,
    connection: &Connection,
) -> i64 {
    connection
        .execute(
            "INSERT INTO member (name, username, credit) VALUES (?1, ?2, ?3)",
            params![name, username, credit],
        )
        .expect("Could not insert member");
    connection.last_insert_rowid()
}

/// Insert an establishment without a credential and return its ID.
#[track_caller]
pub(crate) fn seed_establishment(name: &str, username: &str, connection: &Connection) -> i64 {
    connection
        .execute(
            "INSERT INTO establishment (name, username, created_at) VALUES (?1, ?2, 0)",
            params![name, username],
        )
        .expect("Could not insert establishment");
    connection.last_insert_rowid()
}

/// Insert a ledger entry directly, leaving the member's credit untouched.
#[track_caller]
pub(crate) fn insert_entry(
    created_at: OffsetDateTime,
    amount: Money,
    member_id: i64,
    establishment_id: i64,
    connection: &Connection,
) -> i64 {
    connection
        .execute(
            "INSERT INTO entry (created_at, order_number, amount, member_id, establishment_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                created_at.unix_timestamp(),
                format!("OS-{}", created_at.unix_timestamp()),
                amount,
                member_id,
                establishment_id
            ],
        )
        .expect("Could not insert entry");
    connection.last_insert_rowid()
}

pub(crate) fn admin_user() -> CurrentUser {
    CurrentUser {
        user_id: UserID::new(1),
        role: Role::Admin,
        link_id: 1,
    }
}

pub(crate) fn establishment_user(establishment_id: i64) -> CurrentUser {
    CurrentUser {
        user_id: UserID::new(2),
        role: Role::Establishment,
        link_id: establishment_id,
    }
}

pub(crate) fn member_user(member_id: i64) -> CurrentUser {
    CurrentUser {
        user_id: UserID::new(3),
        role: Role::Member,
        link_id: member_id,
    }
}
