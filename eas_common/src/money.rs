use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------       Money        ---------------------------------------------------------
/// An amount of money in the minor unit of its currency (cents for USD, cents for KES).
///
/// The currency itself is carried next to the amount on the order. Gateways disagree on how they want amounts
/// formatted, so the conversions live here: PayPal takes a two-decimal string, M-Pesa wants whole shillings.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount of money: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Parses decimal amounts such as `"49.99"`, `"50"` or `"1.5"`. More than two decimal places is an error rather than
/// a silent rounding.
impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(MoneyConversionError(s.to_string()));
        }
        let whole = whole.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))? * 10,
            _ => frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?,
        };
        let value = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(|| MoneyConversionError(format!("{s} is too large")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major_units(units: i64) -> Self {
        Self(units * 100)
    }

    /// Whole major units, rounded up. STK push requests only accept integer amounts, and rounding down would
    /// undercharge.
    pub fn major_units_ceil(&self) -> i64 {
        (self.0 + 99).div_euclid(100)
    }

    /// Converts a floating point major-unit amount, as reported in some gateway callbacks, to minor units.
    pub fn from_major_f64(value: f64) -> Result<Self, MoneyConversionError> {
        if !value.is_finite() {
            return Err(MoneyConversionError(value.to_string()));
        }
        let cents = (value * 100.0).round();
        if cents.abs() > i64::MAX as f64 {
            return Err(MoneyConversionError(value.to_string()));
        }
        Ok(Self(cents as i64))
    }
}
