//! [`PropertyType`] definitions.

use std::{str::FromStr, sync::LazyLock};

use common::Money;
use derive_more::{AsRef, Display};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of a property a remaining useful life is estimated for.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PropertyType {
    /// Unique [`Key`] of this [`PropertyType`].
    pub key: Key,

    /// Human-readable label of this [`PropertyType`].
    pub label: String,

    /// Total useful life of this [`PropertyType`] in years, if configured.
    #[serde(default)]
    pub gnd: Option<Gnd>,

    /// Standard base price of an assessment of this [`PropertyType`].
    ///
    /// [`None`] means the price is provided on request only.
    #[serde(default, rename = "price_standard_eur")]
    pub price_standard: Option<Money>,

    /// Indicator whether an assessment of this [`PropertyType`] is only
    /// provided on request.
    #[serde(default)]
    pub request_only: bool,

    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Total useful life in years.
pub type Gnd = u16;

/// Unique slug of a [`PropertyType`].
#[derive(
    AsRef, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Creates a new [`Key`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `key` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Creates a new [`Key`] if the given `key` is valid.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        Self::check(&key).then_some(Self(key))
    }

    /// Checks whether the given `key` is a valid [`Key`].
    fn check(key: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Key`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[a-z0-9_]{1,64}$").expect("valid regex")
        });

        REGEX.is_match(key.as_ref())
    }
}

impl FromStr for Key {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `PropertyType` key")
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}
