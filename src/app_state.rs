//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error,
    auth::DEFAULT_COOKIE_DURATION,
    cache::LastEntryCache,
    db::initialize,
    ledger::{CreditPolicy, EditWindow},
    timezone::{DEFAULT_TIMEZONE, get_local_offset},
};

/// The settings an operator can change when starting the server.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// The local timezone as a canonical timezone name, e.g. "America/Sao_Paulo".
    pub local_timezone: String,
    /// How long after creation an establishment may change a ledger entry.
    pub edit_window: EditWindow,
    /// Whether a ledger entry may take a member's credit below zero.
    pub credit_policy: CreditPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            local_timezone: DEFAULT_TIMEZONE.to_owned(),
            edit_window: EditWindow::default(),
            credit_policy: CreditPolicy::default(),
        }
    }
}

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The local timezone as a canonical timezone name, e.g. "America/Sao_Paulo".
    pub local_timezone: String,

    /// How long after creation an establishment may change a ledger entry.
    pub edit_window: EditWindow,

    /// Whether a ledger entry may take a member's credit below zero.
    pub credit_policy: CreditPolicy,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// The ID of the newest ledger entry, shared by every poll.
    pub last_entry_cache: Arc<LastEntryCache>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the timezone is not a known canonical name or the
    /// database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        config: AppConfig,
    ) -> Result<Self, Error> {
        if get_local_offset(&config.local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(config.local_timezone));
        }

        initialize(&db_connection, &config.local_timezone)?;

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: config.local_timezone,
            edit_window: config.edit_window,
            credit_policy: config.credit_policy,
            db_connection: Arc::new(Mutex::new(db_connection)),
            last_entry_cache: Arc::new(LastEntryCache::default()),
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
