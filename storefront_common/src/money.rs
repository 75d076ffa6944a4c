use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const MINOR_UNITS_PER_MAJOR: i64 = 100;
pub const DEFAULT_CURRENCY_CODE: &str = "RUB";

//--------------------------------------        Money         ---------------------------------------------------------
/// A fixed-point monetary amount with two fraction digits, stored as a count of minor units (e.g. kopecks or cents).
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(minor_units: i64) -> Self {
        Self(minor_units)
    }
}

impl Money {
    pub fn from_minor_units(minor_units: i64) -> Self {
        Self(minor_units)
    }

    /// Builds an amount from a whole number of major units, e.g. `Money::from_major(10)` is 10.00.
    pub fn from_major(major: i64) -> Self {
        Self(major * MINOR_UNITS_PER_MAJOR)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `self * rhs`, or `None` if the product does not fit in an `i64` count of minor units.
    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// The amount as a decimal string with exactly two fraction digits, as payment gateways expect it.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_major = MINOR_UNITS_PER_MAJOR.unsigned_abs();
        format!("{sign}{}.{:02}", abs / per_major, abs % per_major)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses `"10"`, `"10.5"` or `"10.50"`. More than two fraction digits are rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (major, minor) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };
        let all_digits = |v: &str| v.chars().all(|c| c.is_ascii_digit());
        if major.is_empty() || !all_digits(major) || !all_digits(minor) {
            return Err(MoneyConversionError(format!("'{s}' is not a decimal number")));
        }
        if minor.len() > 2 {
            return Err(MoneyConversionError(format!("'{s}' has more than two fraction digits")));
        }
        let major = major.parse::<i64>().map_err(|e| MoneyConversionError(format!("'{s}': {e}")))?;
        let minor = match minor.len() {
            0 => 0,
            1 => minor.parse::<i64>().map_err(|e| MoneyConversionError(format!("'{s}': {e}")))? * 10,
            _ => minor.parse::<i64>().map_err(|e| MoneyConversionError(format!("'{s}': {e}")))?,
        };
        let value = major
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|v| v.checked_add(minor))
            .ok_or_else(|| MoneyConversionError(format!("'{s}' is too large")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formats_with_two_fraction_digits() {
        assert_eq!(Money::from_major(25).to_string(), "25.00");
        assert_eq!(Money::from(1005).to_string(), "10.05");
        assert_eq!(Money::from(7).to_string(), "0.07");
        assert_eq!(Money::from(-150).to_string(), "-1.50");
        assert_eq!(Money::default().to_decimal_string(), "0.00");
    }

    #[test]
    fn parses_decimal_strings() {
        assert_eq!("10".parse::<Money>().unwrap(), Money::from(1000));
        assert_eq!("10.5".parse::<Money>().unwrap(), Money::from(1050));
        assert_eq!(" 10.05 ".parse::<Money>().unwrap(), Money::from(1005));
        assert_eq!("-0.25".parse::<Money>().unwrap(), Money::from(-25));
        assert!("10.005".parse::<Money>().is_err());
        assert!("ten".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
        assert!("99999999999999999999".parse::<Money>().is_err());
    }

    #[test]
    fn arithmetic() {
        let price = Money::from_major(10);
        let total: Money = vec![price * 2, Money::from(500)].into_iter().sum();
        assert_eq!(total, Money::from_major(25));
        let mut running = total;
        running -= Money::from_major(5);
        running += Money::from(1);
        assert_eq!(running, Money::from(2001));
        assert!((-running).is_negative());
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let price = Money::from_major(10);
        assert_eq!(price.checked_mul(3), Some(Money::from_major(30)));
        assert_eq!(price.checked_mul(i64::MAX / 2), None);
        assert_eq!(price.checked_add(Money::from(1)), Some(Money::from(1001)));
        assert_eq!(Money::from(i64::MAX).checked_add(Money::from(1)), None);
    }

    #[test]
    fn serializes_as_minor_units() {
        let json = serde_json::to_string(&Money::from(2500)).unwrap();
        assert_eq!(json, "2500");
    }
}
