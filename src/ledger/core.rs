use rusqlite::{Connection, Row, params};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{EntryId, EstablishmentId, MemberId},
    db::{get_optional_timestamp, get_timestamp},
    ledger::filter::EntryFilter,
    money::Money,
};

/// A debit of a member's credit made by an establishment ("lançamento").
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: EntryId,
    /// When the entry was recorded, in UTC.
    pub created_at: OffsetDateTime,
    /// The establishment's order number ("Nº OS").
    pub order_number: String,
    /// The amount taken from the member's credit, always positive.
    pub amount: Money,
    pub description: Option<String>,
    pub member_id: MemberId,
    pub establishment_id: EstablishmentId,
    /// When the entry was last edited, in UTC.
    pub updated_at: Option<OffsetDateTime>,
}

/// An entry with the names of the member and establishment it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDetails {
    pub entry: Entry,
    pub member_name: String,
    pub establishment_name: String,
}

pub fn create_entry_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS entry (
            id INTEGER PRIMARY KEY,
            created_at INTEGER NOT NULL,
            order_number TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            description TEXT,
            member_id INTEGER NOT NULL,
            establishment_id INTEGER NOT NULL,
            updated_at INTEGER,
            FOREIGN KEY(member_id) REFERENCES member(id) ON UPDATE CASCADE ON DELETE RESTRICT,
            FOREIGN KEY(establishment_id) REFERENCES establishment(id) ON UPDATE CASCADE ON DELETE RESTRICT
        )",
        (),
    )?;

    // Listings are always ordered and usually filtered by time.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_entry_created_at ON entry(created_at)",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_entry_member_id ON entry(member_id)",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_entry_establishment_id ON entry(establishment_id)",
        (),
    )?;

    Ok(())
}

const ENTRY_COLUMNS: &str = "e.id, e.created_at, e.order_number, e.amount, e.description, \
    e.member_id, e.establishment_id, e.updated_at";

fn map_entry_row(row: &Row) -> Result<Entry, rusqlite::Error> {
    Ok(Entry {
        id: row.get(0)?,
        created_at: get_timestamp(row, 1)?,
        order_number: row.get(2)?,
        amount: row.get(3)?,
        description: row.get(4)?,
        member_id: row.get(5)?,
        establishment_id: row.get(6)?,
        updated_at: get_optional_timestamp(row, 7)?,
    })
}

fn map_entry_details_row(row: &Row) -> Result<EntryDetails, rusqlite::Error> {
    Ok(EntryDetails {
        entry: map_entry_row(row)?,
        member_name: row.get(8)?,
        establishment_name: row.get(9)?,
    })
}

/// Get a ledger entry by ID.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no entry with `id`.
pub fn get_entry(id: EntryId, connection: &Connection) -> Result<Entry, Error> {
    connection
        .prepare(&format!("SELECT {ENTRY_COLUMNS} FROM entry e WHERE e.id = ?1"))?
        .query_row([id], map_entry_row)
        .map_err(Error::from)
}

/// Get a ledger entry by ID along with the member and establishment names.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no entry with `id`.
pub fn get_entry_details(id: EntryId, connection: &Connection) -> Result<EntryDetails, Error> {
    connection
        .prepare(&format!(
            "SELECT {ENTRY_COLUMNS}, m.name, est.name FROM entry e
             INNER JOIN member m ON m.id = e.member_id
             INNER JOIN establishment est ON est.id = e.establishment_id
             WHERE e.id = ?1"
        ))?
        .query_row([id], map_entry_details_row)
        .map_err(Error::from)
}

/// The ID of the newest entry, or zero when the ledger is empty.
pub fn latest_entry_id(connection: &Connection) -> Result<EntryId, Error> {
    connection
        .query_row("SELECT COALESCE(MAX(id), 0) FROM entry", [], |row| row.get(0))
        .map_err(Error::from)
}

// Every filter condition is skipped when its parameter is NULL.
const FILTER_CLAUSE: &str = "(?1 IS NULL OR e.member_id = ?1) \
    AND (?2 IS NULL OR e.establishment_id = ?2) \
    AND (?3 IS NULL OR e.created_at >= ?3) \
    AND (?4 IS NULL OR e.created_at < ?4)";

/// The SQL parameters for [FILTER_CLAUSE].
fn filter_params(
    filter: &EntryFilter,
    timezone: &str,
) -> Result<(Option<MemberId>, Option<EstablishmentId>, Option<i64>, Option<i64>), Error> {
    let range = filter.utc_range(timezone)?;

    Ok((
        filter.member_id,
        filter.establishment_id,
        range.map(|range| range.start_timestamp()),
        range.map(|range| range.end_timestamp()),
    ))
}

/// Get the entries matching `filter`, newest first.
///
/// Entries recorded at the same second are ordered by descending ID.
///
/// # Errors
///
/// Returns [Error::InvalidTimezoneError] if `timezone` is not a canonical
/// timezone name, or [Error::SqlError] if the query fails.
pub fn query_entries(
    filter: &EntryFilter,
    timezone: &str,
    connection: &Connection,
) -> Result<Vec<EntryDetails>, Error> {
    let values = filter_params(filter, timezone)?;

    connection
        .prepare(&format!(
            "SELECT {ENTRY_COLUMNS}, m.name, est.name FROM entry e
             INNER JOIN member m ON m.id = e.member_id
             INNER JOIN establishment est ON est.id = e.establishment_id
             WHERE {FILTER_CLAUSE}
             ORDER BY e.created_at DESC, e.id DESC"
        ))?
        .query_map(params![values.0, values.1, values.2, values.3], map_entry_details_row)?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Count the entries matching `filter`.
pub fn count_entries(
    filter: &EntryFilter,
    timezone: &str,
    connection: &Connection,
) -> Result<u32, Error> {
    let values = filter_params(filter, timezone)?;

    connection
        .query_row(
            &format!("SELECT COUNT(e.id) FROM entry e WHERE {FILTER_CLAUSE}"),
            params![values.0, values.1, values.2, values.3],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Add up the amounts of the entries matching `filter`.
pub fn sum_entries(
    filter: &EntryFilter,
    timezone: &str,
    connection: &Connection,
) -> Result<Money, Error> {
    let values = filter_params(filter, timezone)?;

    connection
        .query_row(
            &format!("SELECT COALESCE(SUM(e.amount), 0) FROM entry e WHERE {FILTER_CLAUSE}"),
            params![values.0, values.1, values.2, values.3],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// The members with the largest summed entries matching `filter`, largest first.
pub fn top_members_by_amount(
    filter: &EntryFilter,
    limit: usize,
    timezone: &str,
    connection: &Connection,
) -> Result<Vec<(String, Money)>, Error> {
    let values = filter_params(filter, timezone)?;

    connection
        .prepare(&format!(
            "SELECT m.name, SUM(e.amount) AS total FROM entry e
             INNER JOIN member m ON m.id = e.member_id
             WHERE {FILTER_CLAUSE}
             GROUP BY m.id
             ORDER BY total DESC, m.name ASC
             LIMIT ?5"
        ))?
        .query_map(
            params![values.0, values.1, values.2, values.3, limit as i64],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?
        .map(|row| row.map_err(Error::from))
        .collect()
}
