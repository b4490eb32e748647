//! [`Money`]-related definitions.

use std::{fmt, iter::Sum, ops, str::FromStr};

#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::{prelude::ToPrimitive as _, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::Percent;

/// Amount of money in whole euros.
///
/// Every amount the service stores or displays is an integer number of euros,
/// so fractional results of percentage arithmetic are rounded half away from
/// zero right where they are produced.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero [`Money`].
    pub const ZERO: Self = Self(0);

    /// Creates a new [`Money`] out of the provided whole euros.
    #[must_use]
    pub const fn eur(amount: i64) -> Self {
        Self(amount)
    }

    /// Creates a new [`Money`] by rounding the provided [`Decimal`] amount to
    /// whole euros.
    ///
    /// [`None`] is returned if the amount doesn't fit.
    #[must_use]
    pub fn round(amount: Decimal) -> Option<Self> {
        amount
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
    }

    /// Returns the amount of whole euros of this [`Money`].
    #[must_use]
    pub const fn amount(self) -> i64 {
        self.0
    }

    /// Returns the provided [`Percent`] of this [`Money`], rounded to whole
    /// euros.
    #[must_use]
    pub fn percent(self, percent: Percent) -> Self {
        let share = Decimal::from(self.0) * percent.value()
            / Decimal::ONE_HUNDRED;
        Self::round(share).unwrap_or(self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}EUR", self.0)
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = s.trim();
        let amount = amount.strip_suffix("EUR").unwrap_or(amount).trim_end();
        if amount.is_empty() {
            return Err("empty amount");
        }
        Decimal::from_str(amount)
            .ok()
            .and_then(Self::round)
            .ok_or("invalid amount")
    }
}

impl From<Money> for Decimal {
    fn from(m: Money) -> Self {
        Self::from(m.0)
    }
}

/// Saturates at the bounds of [`Money`] instead of overflowing.
impl ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

/// Saturates at the bounds of [`Money`] instead of overflowing.
impl ops::Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, ops::Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use crate::Percent;

    use super::Money;

    fn percent(s: &str) -> Percent {
        s.parse().unwrap()
    }

    #[test]
    fn from_str() {
        assert_eq!(Money::from_str("1499").unwrap(), Money::eur(1499));
        assert_eq!(Money::from_str("1499EUR").unwrap(), Money::eur(1499));
        assert_eq!(Money::from_str(" 350 EUR").unwrap(), Money::eur(350));
        assert_eq!(Money::from_str("123.5").unwrap(), Money::eur(124));
        assert_eq!(Money::from_str("123.49EUR").unwrap(), Money::eur(123));
        assert_eq!(Money::from_str("-0.5").unwrap(), Money::eur(-1));

        assert!(Money::from_str("").is_err());
        assert!(Money::from_str("EUR").is_err());
        assert!(Money::from_str("12USD").is_err());
        assert!(Money::from_str("twelve").is_err());
    }

    #[test]
    fn to_string() {
        assert_eq!(Money::eur(1099).to_string(), "1099EUR");
        assert_eq!(Money::ZERO.to_string(), "0EUR");
    }

    #[test]
    fn percent_rounds_half_away_from_zero() {
        assert_eq!(Money::eur(1000).percent(percent("10")), Money::eur(100));
        assert_eq!(Money::eur(900).percent(percent("19")), Money::eur(171));
        assert_eq!(Money::eur(1449).percent(percent("19")), Money::eur(275));
        assert_eq!(Money::eur(50).percent(percent("19")), Money::eur(10));
        assert_eq!(Money::eur(5).percent(percent("10")), Money::eur(1));
        assert_eq!(Money::eur(1).percent(percent("0")), Money::ZERO);
    }

    #[test]
    fn sums() {
        let items = [Money::eur(1499), Money::eur(350)];

        assert_eq!(items.iter().sum::<Money>(), Money::eur(1849));
        assert_eq!(
            Decimal::from(Money::eur(1849) - Money::eur(49)),
            Decimal::from(1800),
        );
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let max = Money::eur(i64::MAX);

        assert_eq!(max + Money::eur(350), max);
        assert_eq!([max, Money::eur(1)].iter().sum::<Money>(), max);
        assert_eq!(Money::eur(i64::MIN) - Money::eur(1), Money::eur(i64::MIN));
        assert_eq!(Money::eur(1000) - Money::eur(100), Money::eur(900));
    }
}
