//! Database initialization and best-effort schema patching.

use rusqlite::{Connection, Transaction, TransactionBehavior, types::Type};
use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::{
    Error,
    auth::{create_admin_table, create_user_table},
    establishment::create_establishment_table,
    ledger::create_entry_table,
    member::create_member_table,
    timezone::get_offset_at,
};

/// Create the application's tables and bring older databases up to date.
///
/// `local_timezone` is the canonical timezone name used to interpret legacy
/// timestamps that were stored without an offset.
///
/// # Errors
///
/// Returns an error if the tables cannot be created. Failures while patching
/// an existing schema are logged and otherwise ignored.
pub fn initialize(connection: &Connection, local_timezone: &str) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_admin_table(&transaction)?;
    create_establishment_table(&transaction)?;
    create_member_table(&transaction)?;
    create_user_table(&transaction)?;
    create_entry_table(&transaction)?;

    transaction.commit()?;

    add_missing_columns(connection);
    normalize_legacy_timestamps(connection, local_timezone);

    Ok(())
}

/// Read a column holding UTC unix seconds.
pub(crate) fn get_timestamp(
    row: &rusqlite::Row,
    index: usize,
) -> Result<OffsetDateTime, rusqlite::Error> {
    let seconds: i64 = row.get(index)?;

    OffsetDateTime::from_unix_timestamp(seconds).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(error))
    })
}

/// Read a nullable column holding UTC unix seconds.
pub(crate) fn get_optional_timestamp(
    row: &rusqlite::Row,
    index: usize,
) -> Result<Option<OffsetDateTime>, rusqlite::Error> {
    let seconds: Option<i64> = row.get(index)?;

    seconds
        .map(|seconds| {
            OffsetDateTime::from_unix_timestamp(seconds).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(error))
            })
        })
        .transpose()
}

/// Columns added after the first release of their table, as (table, column, definition).
const LATER_COLUMNS: &[(&str, &str, &str)] = &[
    ("establishment", "logo", "BLOB"),
    ("establishment", "logo_mime", "TEXT"),
    ("establishment", "created_at", "INTEGER"),
    ("member", "photo", "BLOB"),
    ("member", "photo_mime", "TEXT"),
    ("member", "photo_path", "TEXT"),
    ("member", "credit_updated_at", "INTEGER"),
    ("entry", "description", "TEXT"),
    ("entry", "updated_at", "INTEGER"),
];

fn add_missing_columns(connection: &Connection) {
    for (table, column, definition) in LATER_COLUMNS {
        let sql = format!("ALTER TABLE \"{table}\" ADD COLUMN {column} {definition}");

        match connection.execute(&sql, ()) {
            Ok(_) => tracing::info!("Added column {table}.{column}"),
            Err(rusqlite::Error::SqliteFailure(_, Some(message)))
                if message.contains("duplicate column name") =>
            {
                tracing::debug!("Column {table}.{column} already exists");
            }
            Err(error) => tracing::warn!("Could not add column {table}.{column}: {error}"),
        }
    }
}

/// Timestamp columns that older databases stored as text, as (table, column).
const TIMESTAMP_COLUMNS: &[(&str, &str)] = &[
    ("entry", "created_at"),
    ("entry", "updated_at"),
    ("member", "credit_updated_at"),
    ("establishment", "created_at"),
];

/// Convert timestamps stored as text into UTC unix seconds.
///
/// Text with an offset is converted to UTC. Text without an offset was
/// written as local time, so it is read in `local_timezone`.
fn normalize_legacy_timestamps(connection: &Connection, local_timezone: &str) {
    for (table, column) in TIMESTAMP_COLUMNS {
        if let Err(error) = normalize_column(connection, table, column, local_timezone) {
            tracing::warn!("Could not normalize timestamps in {table}.{column}: {error}");
        }
    }
}

fn normalize_column(
    connection: &Connection,
    table: &str,
    column: &str,
    local_timezone: &str,
) -> Result<(), Error> {
    let rows: Vec<(i64, String)> = connection
        .prepare(&format!(
            "SELECT id, {column} FROM \"{table}\" WHERE typeof({column}) = 'text'"
        ))?
        .query_map((), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;

    if rows.is_empty() {
        return Ok(());
    }

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)?;
    let mut converted = 0;

    {
        let mut update = transaction.prepare(&format!(
            "UPDATE \"{table}\" SET {column} = ?1 WHERE id = ?2"
        ))?;

        for (id, text) in rows {
            match parse_legacy_timestamp(&text, local_timezone) {
                Some(instant) => {
                    update.execute((instant.unix_timestamp(), id))?;
                    converted += 1;
                }
                None => {
                    tracing::warn!("Unrecognised timestamp {text:?} in {table}.{column} id={id}")
                }
            }
        }
    }

    transaction.commit()?;
    tracing::info!("Normalized {converted} timestamps in {table}.{column}");

    Ok(())
}

const OFFSET_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory]:[offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory]:[offset_minute]"
    ),
];

const NAIVE_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
];

/// Parse a timestamp written by an older version of the application.
pub(crate) fn parse_legacy_timestamp(text: &str, local_timezone: &str) -> Option<OffsetDateTime> {
    let text = text.trim();

    if let Some(instant) = OFFSET_FORMATS
        .iter()
        .find_map(|format| OffsetDateTime::parse(text, *format).ok())
    {
        return Some(instant.to_offset(time::UtcOffset::UTC));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(text, *format).ok())?;
    let offset = get_offset_at(local_timezone, naive.assume_utc())?;
    let offset = get_offset_at(local_timezone, naive.assume_offset(offset))?;

    Some(naive.assume_offset(offset).to_offset(time::UtcOffset::UTC))
}
