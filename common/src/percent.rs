//! [`Percent`]-related definitions.

use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Floating-point percentage in `[0, 100]` range.
#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct Percent(Decimal);

impl Percent {
    /// Zero [`Percent`].
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Full hundred [`Percent`].
    pub const HUNDRED: Self = Self(Decimal::ONE_HUNDRED);

    /// Creates a new [`Percent`] by checking the provided value is within
    /// `[0, 100]` range.
    #[must_use]
    pub fn new(val: Decimal) -> Option<Self> {
        (Decimal::ZERO..=Decimal::ONE_HUNDRED)
            .contains(&val)
            .then(|| Self(val.normalize()))
    }

    /// Creates a new [`Percent`] by clamping the provided value into
    /// `[0, 100]` range.
    #[must_use]
    pub fn clamped(val: Decimal) -> Self {
        Self(val.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED).normalize())
    }

    /// Returns the numeric value of this [`Percent`].
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }
}

impl FromStr for Percent {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .ok()
            .and_then(Self::new)
            .ok_or("invalid percent value")
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let val = <Decimal as Deserialize>::deserialize(d)?;
        Self::new(val).ok_or_else(|| {
            de::Error::custom(format!("percent out of range: {val}"))
        })
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::Percent;

    #[test]
    fn from_str() {
        assert_eq!(Percent::from_str("19").unwrap().to_string(), "19");
        assert_eq!(Percent::from_str("10.50").unwrap().to_string(), "10.5");
        assert_eq!(Percent::from_str("0").unwrap(), Percent::ZERO);
        assert_eq!(Percent::from_str("100").unwrap(), Percent::HUNDRED);

        assert!(Percent::from_str("-1").is_err());
        assert!(Percent::from_str("100.01").is_err());
        assert!(Percent::from_str("ten").is_err());
    }

    #[test]
    fn clamps() {
        assert_eq!(Percent::clamped(Decimal::from(-5)), Percent::ZERO);
        assert_eq!(Percent::clamped(Decimal::from(250)), Percent::HUNDRED);
        assert_eq!(Percent::clamped(Decimal::from(15)).value(), 15.into());
    }
}
