//! [`DiscountCode`] definitions.

use std::{str::FromStr, sync::LazyLock};

use common::Percent;
use derive_more::{AsRef, Display};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Code granting a percentage discount on offers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DiscountCode {
    /// [`Code`] customers enter.
    pub code: Code,

    /// Human-readable label of this [`DiscountCode`].
    #[serde(default)]
    pub label: Option<String>,

    /// Granted discount.
    pub percent: Percent,

    /// Indicator whether this [`DiscountCode`] may be applied.
    #[serde(default = "active")]
    pub is_active: bool,
}

impl DiscountCode {
    /// Checks whether the provided [`Percent`] is a valid discount.
    #[must_use]
    pub fn is_valid_percent(percent: Percent) -> bool {
        percent.value() >= Decimal::ONE
    }
}

/// Default of [`DiscountCode::is_active`].
const fn active() -> bool {
    true
}

/// Normalized code of a [`DiscountCode`].
#[derive(
    AsRef, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct Code(String);

impl Code {
    /// Maximum length of a [`Code`].
    pub const MAX_LENGTH: usize = 50;

    /// Creates a new [`Code`] if the given `code` is valid.
    ///
    /// The `code` is trimmed and uppercased, so [`Code`]s compare
    /// case-insensitively.
    #[must_use]
    pub fn new(code: impl AsRef<str>) -> Option<Self> {
        let code = code.as_ref().trim().to_uppercase();
        Self::check(&code).then_some(Self(code))
    }

    /// Checks whether the given `code` is a valid [`Code`].
    fn check(code: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Code`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Z0-9_-]+$").expect("valid regex")
        });

        let code = code.as_ref();
        code.len() <= Self::MAX_LENGTH && REGEX.is_match(code)
    }
}

impl FromStr for Code {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid discount `Code`")
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}
