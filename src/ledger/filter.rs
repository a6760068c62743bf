//! Filters for ledger listings and exports, parsed from query strings and
//! scoped to what the logged in user may see.

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, macros::format_description};

use crate::{
    Error,
    auth::{CurrentUser, Role},
    database_id::{EstablishmentId, MemberId},
    timezone::{DayRange, UtcRange, get_local_offset, get_offset_at, month_range},
};

/// A span of local calendar time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Whole local days, both ends included.
    Days(DayRange),
    /// A whole local calendar month.
    Month { year: i32, month: Month },
}

impl Period {
    /// The local month containing `now`.
    pub fn current_month(now: OffsetDateTime, timezone: &str) -> Result<Self, Error> {
        let offset = get_offset_at(timezone, now)
            .ok_or_else(|| Error::InvalidTimezoneError(timezone.to_owned()))?;
        let today = now.to_offset(offset).date();

        Ok(Period::Month {
            year: today.year(),
            month: today.month(),
        })
    }

    /// The half-open UTC range covering the period in `timezone`.
    ///
    /// # Errors
    ///
    /// - [Error::InvalidTimezoneError] if `timezone` is not a canonical timezone name.
    /// - [Error::PeriodOutOfRange] if the period, or the day after it, is
    ///   not a representable date.
    pub fn to_utc(self, timezone: &str) -> Result<UtcRange, Error> {
        if get_local_offset(timezone).is_none() {
            return Err(Error::InvalidTimezoneError(timezone.to_owned()));
        }

        let range = match self {
            Period::Days(days) => days.to_utc(timezone),
            Period::Month { year, month } => month_range(year, month, timezone),
        };

        range.ok_or(Error::PeriodOutOfRange)
    }
}

/// Which entries to select. `None` fields do not restrict the selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub member_id: Option<MemberId>,
    pub establishment_id: Option<EstablishmentId>,
    pub period: Option<Period>,
}

impl EntryFilter {
    /// The UTC range of the filter's period, if it has one.
    pub fn utc_range(&self, timezone: &str) -> Result<Option<UtcRange>, Error> {
        self.period.map(|period| period.to_utc(timezone)).transpose()
    }

    /// Restrict the filter to the entries `user` may see.
    ///
    /// Establishments only see their own entries and members only their own
    /// debits, whatever the query asked for.
    pub fn scoped_to(mut self, user: &CurrentUser) -> Self {
        match user.role {
            Role::Admin => {}
            Role::Establishment => self.establishment_id = Some(user.link_id),
            Role::Member => self.member_id = Some(user.link_id),
        }

        self
    }
}

/// The period used when a request does not name one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPeriod {
    /// The local month containing the request time.
    CurrentMonth,
    /// No time restriction.
    Everything,
}

/// The filter parameters accepted in query strings.
///
/// Values are kept as text so that blank and malformed values can be
/// ignored instead of failing the whole request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EntryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub establishment_id: Option<String>,
    /// First local day, `YYYY-mm-dd`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Last local day, `YYYY-mm-dd`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// A local month, `YYYY-mm`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_id(name: &str, value: &Option<String>) -> Option<i64> {
    let value = non_blank(value)?;

    match value.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!("Ignoring invalid {name} {value:?} in entry filter");
            None
        }
    }
}

fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value, format_description!("[year]-[month]-[day]")).ok()
}

fn parse_month(value: &str) -> Option<Period> {
    let (year, month) = value.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;

    Some(Period::Month { year, month })
}

impl EntryQuery {
    /// The period named by the query, `Ok(None)` if it names none.
    ///
    /// A day range needs both `start` and `end` and takes precedence over `month`.
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if a period was given but could not be parsed, or
    /// lies at the edge of the calendar where it has no UTC range.
    fn period(&self, timezone: &str) -> Result<Option<Period>, ()> {
        let period = self.parse_period()?;

        match period.map(|period| period.to_utc(timezone)) {
            Some(Err(Error::PeriodOutOfRange)) => Err(()),
            _ => Ok(period),
        }
    }

    fn parse_period(&self) -> Result<Option<Period>, ()> {
        match (non_blank(&self.start), non_blank(&self.end)) {
            (Some(start), Some(end)) => {
                let start = parse_date(start).ok_or(())?;
                let end = parse_date(end).ok_or(())?;

                return Ok(Some(Period::Days(DayRange { start, end })));
            }
            (Some(_), None) | (None, Some(_)) if non_blank(&self.month).is_none() => {
                return Err(());
            }
            _ => {}
        }

        match non_blank(&self.month) {
            Some(month) => parse_month(month).map(Some).ok_or(()),
            None => Ok(None),
        }
    }

    /// Build the filter for `user`, using `default_period` when the query
    /// names no period or names one that cannot be parsed.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidTimezoneError] if the current month is needed
    /// and `timezone` is not a canonical timezone name.
    pub fn to_filter(
        &self,
        user: &CurrentUser,
        default_period: DefaultPeriod,
        now: OffsetDateTime,
        timezone: &str,
    ) -> Result<EntryFilter, Error> {
        let period = match self.period(timezone) {
            Ok(Some(period)) => Some(period),
            Ok(None) => None,
            Err(()) => {
                tracing::warn!(
                    "Ignoring invalid period in entry filter: start={:?} end={:?} month={:?}",
                    self.start,
                    self.end,
                    self.month
                );
                None
            }
        };

        let period = match (period, default_period) {
            (Some(period), _) => Some(period),
            (None, DefaultPeriod::CurrentMonth) => Some(Period::current_month(now, timezone)?),
            (None, DefaultPeriod::Everything) => None,
        };

        let filter = EntryFilter {
            member_id: parse_id("member_id", &self.member_id),
            establishment_id: parse_id("establishment_id", &self.establishment_id),
            period,
        };

        Ok(filter.scoped_to(user))
    }

    /// The query as a URL query string, without the leading `?`.
    pub fn to_query_string(&self) -> String {
        serde_urlencoded::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use time::{
        Month,
        macros::{date, datetime},
    };

    use crate::{
        Error,
        auth::{CurrentUser, Role, UserID},
        timezone::DayRange,
    };

    use super::{DefaultPeriod, EntryFilter, EntryQuery, Period};

    const SAO_PAULO: &str = "America/Sao_Paulo";

    fn user(role: Role, link_id: i64) -> CurrentUser {
        CurrentUser {
            user_id: UserID::new(1),
            role,
            link_id,
        }
    }

    fn query(pairs: &[(&str, &str)]) -> EntryQuery {
        let encoded = serde_urlencoded::to_string(pairs).unwrap();
        serde_urlencoded::from_str(&encoded).unwrap()
    }

    #[test]
    fn empty_query_defaults_to_current_local_month() {
        let now = datetime!(2024-03-01 01:00 UTC);

        let filter = EntryQuery::default()
            .to_filter(&user(Role::Admin, 1), DefaultPeriod::CurrentMonth, now, SAO_PAULO)
            .unwrap();

        assert_eq!(
            filter,
            EntryFilter {
                member_id: None,
                establishment_id: None,
                period: Some(Period::Month {
                    year: 2024,
                    month: Month::February
                }),
            }
        );
    }

    #[test]
    fn export_default_has_no_period() {
        let now = datetime!(2024-03-01 01:00 UTC);

        let filter = EntryQuery::default()
            .to_filter(&user(Role::Admin, 1), DefaultPeriod::Everything, now, SAO_PAULO)
            .unwrap();

        assert_eq!(filter.period, None);
    }

    #[test]
    fn parses_day_range_and_ids() {
        let now = datetime!(2024-03-10 12:00 UTC);
        let query = query(&[
            ("member_id", "3"),
            ("establishment_id", "4"),
            ("start", "2024-03-01"),
            ("end", "2024-03-05"),
            ("month", "2024-01"),
        ]);

        let filter = query
            .to_filter(&user(Role::Admin, 1), DefaultPeriod::CurrentMonth, now, SAO_PAULO)
            .unwrap();

        assert_eq!(
            filter,
            EntryFilter {
                member_id: Some(3),
                establishment_id: Some(4),
                period: Some(Period::Days(DayRange {
                    start: date!(2024 - 03 - 01),
                    end: date!(2024 - 03 - 05),
                })),
            }
        );
    }

    #[test]
    fn parses_month() {
        let now = datetime!(2024-03-10 12:00 UTC);

        let filter = query(&[("month", "2023-12")])
            .to_filter(&user(Role::Admin, 1), DefaultPeriod::Everything, now, SAO_PAULO)
            .unwrap();

        assert_eq!(
            filter.period,
            Some(Period::Month {
                year: 2023,
                month: Month::December
            })
        );
    }

    #[test]
    fn blank_and_invalid_values_are_ignored() {
        let now = datetime!(2024-03-10 12:00 UTC);

        let filter = query(&[
            ("member_id", ""),
            ("establishment_id", "abc"),
            ("start", "2024-13-01"),
            ("end", "2024-03-05"),
        ])
        .to_filter(&user(Role::Admin, 1), DefaultPeriod::CurrentMonth, now, SAO_PAULO)
        .unwrap();

        assert_eq!(
            filter,
            EntryFilter {
                member_id: None,
                establishment_id: None,
                period: Some(Period::Month {
                    year: 2024,
                    month: Month::March
                }),
            }
        );
    }

    #[test]
    fn periods_at_the_end_of_the_calendar_fall_back_to_default() {
        let now = datetime!(2024-03-10 12:00 UTC);
        let current_month = Some(Period::Month {
            year: 2024,
            month: Month::March,
        });

        for pairs in [
            [("month", "9999-12"), ("start", ""), ("end", "")],
            [("month", "50000-01"), ("start", ""), ("end", "")],
            [("month", ""), ("start", "9999-12-01"), ("end", "9999-12-31")],
        ] {
            let filter = query(&pairs)
                .to_filter(&user(Role::Admin, 1), DefaultPeriod::CurrentMonth, now, SAO_PAULO)
                .unwrap();

            assert_eq!(filter.period, current_month, "want {pairs:?} to be ignored");
            assert!(filter.utc_range(SAO_PAULO).is_ok());
        }
    }

    #[test]
    fn period_conversion_errors_are_distinguished() {
        let month = Period::Month {
            year: 9999,
            month: Month::December,
        };

        assert_eq!(month.to_utc(SAO_PAULO), Err(Error::PeriodOutOfRange));
        assert_eq!(
            month.to_utc("Mars/Base"),
            Err(Error::InvalidTimezoneError("Mars/Base".to_owned()))
        );
    }

    #[test]
    fn start_without_end_falls_back_to_default() {
        let now = datetime!(2024-03-10 12:00 UTC);

        let filter = query(&[("start", "2024-03-01")])
            .to_filter(&user(Role::Admin, 1), DefaultPeriod::Everything, now, SAO_PAULO)
            .unwrap();

        assert_eq!(filter.period, None);
    }

    #[test]
    fn establishment_only_sees_own_entries() {
        let now = datetime!(2024-03-10 12:00 UTC);

        let filter = query(&[("establishment_id", "99"), ("member_id", "3")])
            .to_filter(
                &user(Role::Establishment, 5),
                DefaultPeriod::Everything,
                now,
                SAO_PAULO,
            )
            .unwrap();

        assert_eq!(filter.establishment_id, Some(5));
        assert_eq!(filter.member_id, Some(3));
    }

    #[test]
    fn member_only_sees_own_entries() {
        let now = datetime!(2024-03-10 12:00 UTC);

        let filter = query(&[("member_id", "99")])
            .to_filter(&user(Role::Member, 7), DefaultPeriod::Everything, now, SAO_PAULO)
            .unwrap();

        assert_eq!(filter.member_id, Some(7));
    }

    #[test]
    fn query_string_skips_missing_values() {
        let query = EntryQuery {
            member_id: Some("3".to_owned()),
            month: Some("2024-03".to_owned()),
            ..EntryQuery::default()
        };

        assert_eq!(query.to_query_string(), "member_id=3&month=2024-03");
    }
}
