//! Monetary amounts stored as integer centavos.

use std::{
    fmt::Display,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
    sync::OnceLock,
};

use numfmt::{Formatter, Precision};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::Error;

/// An amount of Brazilian reais, stored as a whole number of centavos.
///
/// Balances may be negative when the server runs with negative credit
/// allowed, so the underlying integer is signed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero reais.
    pub const ZERO: Money = Money(0);

    /// The largest amount in either direction, R$ 9.999.999.999,99.
    ///
    /// Credits and entry amounts stay within `-MAX..=MAX`, so sums of a few
    /// million of them cannot overflow.
    pub const MAX: Money = Money(999_999_999_999);

    /// Create an amount from a number of centavos.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Create an amount from a whole number of reais.
    pub const fn from_reais(reais: i64) -> Self {
        Self(reais * 100)
    }

    /// The amount in centavos.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is strictly less than zero.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Whether the amount lies within `-MAX..=MAX`.
    pub fn is_in_range(&self) -> bool {
        self.0.unsigned_abs() <= Self::MAX.0.unsigned_abs()
    }

    /// Add `rhs`, returning `None` if the result leaves `-MAX..=MAX`.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .filter(Money::is_in_range)
    }

    /// Subtract `rhs`, returning `None` if the result leaves `-MAX..=MAX`.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0
            .checked_sub(rhs.0)
            .map(Money)
            .filter(Money::is_in_range)
    }

    /// The amount in reais as a float, for charts and spreadsheets only.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parse an amount typed by a user.
    ///
    /// Both the Brazilian notation (`1.234,56`) and a plain decimal point
    /// (`1234.56`) are accepted. Without a comma, a single dot is read as
    /// the decimal point and several dots as thousands separators.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidAmount] if the text is empty, signed, has more
    /// than two decimal places, contains anything other than digits and
    /// separators, or is larger than [Money::MAX].
    pub fn parse(text: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidAmount(text.to_owned());
        let trimmed = text.trim();

        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (integer_part, fraction_part) = if trimmed.contains(',') {
            let mut parts = trimmed.splitn(2, ',');
            let integer_part = parts.next().unwrap_or_default();
            let fraction_part = parts.next().unwrap_or_default();

            if fraction_part.contains(',') || fraction_part.contains('.') {
                return Err(invalid());
            }

            (strip_thousands_separators(integer_part)?, Some(fraction_part))
        } else if trimmed.matches('.').count() == 1 {
            let (integer_part, fraction_part) = trimmed.split_once('.').ok_or_else(invalid)?;

            (integer_part.to_owned(), Some(fraction_part))
        } else {
            (strip_thousands_separators(trimmed)?, None)
        };

        if integer_part.is_empty() || !integer_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let fraction_cents = match fraction_part {
            None => 0,
            Some(fraction) if fraction.is_empty() || fraction.len() > 2 => return Err(invalid()),
            Some(fraction) if !fraction.bytes().all(|b| b.is_ascii_digit()) => {
                return Err(invalid());
            }
            Some(fraction) => {
                let value: i64 = fraction.parse().map_err(|_| invalid())?;
                if fraction.len() == 1 { value * 10 } else { value }
            }
        };

        let reais: i64 = integer_part.parse().map_err(|_| invalid())?;

        reais
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction_cents))
            .map(Money)
            .filter(Money::is_in_range)
            .ok_or_else(invalid)
    }

    /// Format the amount for prefilling a form input, e.g. `1234,56`.
    pub fn to_input_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();

        format!("{sign}{},{:02}", cents / 100, cents % 100)
    }
}

/// Remove `.` thousands separators, checking that every group after the first has three digits.
fn strip_thousands_separators(text: &str) -> Result<String, Error> {
    let mut groups = text.split('.');
    let first = groups.next().unwrap_or_default();
    let mut digits = first.to_owned();

    for group in groups {
        if group.len() != 3 || first.is_empty() {
            return Err(Error::InvalidAmount(text.to_owned()));
        }

        digits.push_str(group);
    }

    Ok(digits)
}

fn format_reais(reais: u64) -> String {
    static REAIS_FMT: OnceLock<Option<Formatter>> = OnceLock::new();

    let formatter = REAIS_FMT.get_or_init(|| {
        Formatter::currency("R$ ")
            .ok()
            .map(|formatter| formatter.precision(Precision::Decimals(0)))
    });

    match formatter {
        // numfmt groups thousands with commas, Brazilian notation uses dots.
        Some(formatter) if reais != 0 => formatter.fmt_string(reais as f64).replace(',', "."),
        // Zero is hardcoded as "0" by numfmt, so it is formatted by hand.
        _ => format!("R$ {reais}"),
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cents = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };

        write!(f, "{sign}{},{:02}", format_reais(cents / 100), cents % 100)
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |total, amount| total + amount)
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Money)
    }
}

#[cfg(test)]
mod parse_tests {
    use crate::Error;

    use super::Money;

    #[test]
    fn parses_whole_reais() {
        assert_eq!(Money::parse("12"), Ok(Money::from_cents(1200)));
    }

    #[test]
    fn parses_comma_decimal() {
        assert_eq!(Money::parse("12,50"), Ok(Money::from_cents(1250)));
        assert_eq!(Money::parse("12,5"), Ok(Money::from_cents(1250)));
    }

    #[test]
    fn parses_brazilian_thousands() {
        assert_eq!(Money::parse("1.234,56"), Ok(Money::from_cents(123456)));
        assert_eq!(Money::parse("1.234.567"), Ok(Money::from_cents(123456700)));
    }

    #[test]
    fn parses_decimal_point() {
        assert_eq!(Money::parse("1234.56"), Ok(Money::from_cents(123456)));
        assert_eq!(Money::parse(" 0.05 "), Ok(Money::from_cents(5)));
    }

    #[test]
    fn rejects_bad_input() {
        for text in [
            "", "   ", "-5", "+5", "abc", "12,345", "1.2.3", "12,", ",50", "1,2,3", "1.23,4.5",
            "R$ 10",
        ] {
            assert_eq!(
                Money::parse(text),
                Err(Error::InvalidAmount(text.to_owned())),
                "want {text:?} to be rejected"
            );
        }
    }

    #[test]
    fn rejects_overflow() {
        let text = "99999999999999999999";

        assert_eq!(
            Money::parse(text),
            Err(Error::InvalidAmount(text.to_owned()))
        );
    }

    #[test]
    fn rejects_amounts_above_max() {
        assert_eq!(Money::parse("9.999.999.999,99"), Ok(Money::MAX));

        for text in ["10.000.000.000,00", "92.233.720.368.547.758,07"] {
            assert_eq!(
                Money::parse(text),
                Err(Error::InvalidAmount(text.to_owned())),
                "want {text:?} to be rejected"
            );
        }
    }
}

#[cfg(test)]
mod arithmetic_tests {
    use super::Money;

    #[test]
    fn checked_arithmetic_stays_within_max() {
        let one = Money::from_cents(1);

        assert_eq!(Money::MAX.checked_add(one), None);
        assert_eq!((-Money::MAX).checked_sub(one), None);
        assert_eq!(
            Money::MAX.checked_sub(one),
            Some(Money::from_cents(999_999_999_998))
        );
        assert_eq!(Money::from_cents(i64::MAX).checked_add(one), None);
        assert_eq!(Money::ZERO.checked_sub(Money::MAX), Some(-Money::MAX));
    }
}
