//! Conversions between the configured local timezone and the UTC timestamps in the database.
//!
//! Ledger timestamps are stored as UTC unix seconds. Calendar boundaries typed
//! by users (a day, a month) are local to the configured timezone and are
//! converted to half-open UTC ranges here, before any query runs.

use time::{
    Date, Month, OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};
use time_tz::{Offset, TimeZone};

/// The timezone used when none is configured.
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

/// Get the current UTC offset for a canonical timezone name, e.g. "America/Sao_Paulo".
///
/// Returns `None` if the timezone name is not recognised.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    get_offset_at(canonical_timezone, OffsetDateTime::now_utc())
}

/// Get the UTC offset in effect at `instant` for a canonical timezone name.
pub fn get_offset_at(canonical_timezone: &str, instant: OffsetDateTime) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&instant).to_utc())
}

/// The instant at which `date` starts in the local timezone.
pub fn local_day_start(date: Date, canonical_timezone: &str) -> Option<OffsetDateTime> {
    // Use the offset at UTC midnight as a first guess, then correct it with
    // the offset in effect at the resulting instant.
    let guess = date.midnight().assume_utc();
    let offset = get_offset_at(canonical_timezone, guess)?;
    let start = date.midnight().assume_offset(offset);
    let offset = get_offset_at(canonical_timezone, start)?;

    Some(date.midnight().assume_offset(offset).to_offset(UtcOffset::UTC))
}

/// A half-open range of instants, `start <= t < end`, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl UtcRange {
    /// Whether `instant` falls within the range.
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.start <= instant && instant < self.end
    }

    /// The start as unix seconds, for SQL parameters.
    pub fn start_timestamp(&self) -> i64 {
        self.start.unix_timestamp()
    }

    /// The end as unix seconds, for SQL parameters.
    pub fn end_timestamp(&self) -> i64 {
        self.end.unix_timestamp()
    }
}

/// An inclusive range of local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: Date,
    pub end: Date,
}

impl DayRange {
    /// Convert the local days to the UTC instants from the start of `start`
    /// up to, but not including, the start of the day after `end`.
    pub fn to_utc(self, canonical_timezone: &str) -> Option<UtcRange> {
        let start = local_day_start(self.start, canonical_timezone)?;
        let end = local_day_start(self.end.next_day()?, canonical_timezone)?;

        Some(UtcRange { start, end })
    }
}

/// The UTC range covering a local calendar month.
pub fn month_range(year: i32, month: Month, canonical_timezone: &str) -> Option<UtcRange> {
    let first_day = Date::from_calendar_date(year, month, 1).ok()?;
    let (next_year, next_month) = match month {
        Month::December => (year + 1, Month::January),
        month => (year, month.next()),
    };
    let next_first_day = Date::from_calendar_date(next_year, next_month, 1).ok()?;

    Some(UtcRange {
        start: local_day_start(first_day, canonical_timezone)?,
        end: local_day_start(next_first_day, canonical_timezone)?,
    })
}

/// The UTC range covering the local month that contains `now`.
pub fn current_month_range(now: OffsetDateTime, canonical_timezone: &str) -> Option<UtcRange> {
    let offset = get_offset_at(canonical_timezone, now)?;
    let today = now.to_offset(offset).date();

    month_range(today.year(), today.month(), canonical_timezone)
}

/// Date time format for tables and spreadsheets, e.g. "01/03/2024 23:30".
const DISPLAY_FORMAT: &[BorrowedFormatItem] =
    format_description!("[day]/[month]/[year] [hour]:[minute]");

/// Date time format for the `datetime` attribute of `<time>` elements, e.g. "2024-03-01T23:30:00".
const ISO_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Format an instant as local time for display.
pub fn format_local(instant: OffsetDateTime, canonical_timezone: &str) -> String {
    let local = to_local(instant, canonical_timezone);

    local
        .format(DISPLAY_FORMAT)
        .unwrap_or_else(|_| local.to_string())
}

/// Format an instant as a local ISO 8601 date time without an offset.
pub fn format_local_iso(instant: OffsetDateTime, canonical_timezone: &str) -> String {
    let local = to_local(instant, canonical_timezone);

    local.format(ISO_FORMAT).unwrap_or_else(|_| local.to_string())
}

fn to_local(instant: OffsetDateTime, canonical_timezone: &str) -> OffsetDateTime {
    match get_offset_at(canonical_timezone, instant) {
        Some(offset) => instant.to_offset(offset),
        None => {
            tracing::warn!("Unknown timezone {canonical_timezone}, formatting as UTC");
            instant
        }
    }
}
