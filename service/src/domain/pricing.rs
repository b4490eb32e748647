//! Pricing catalogue [`Entry`] definitions.

use std::{str::FromStr, sync::LazyLock};

use common::Money;
use derive_more::{AsRef, Display};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Priced item of the catalogue offers are composed of.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Entry {
    /// Unique [`Key`] of this [`Entry`].
    pub key: Key,

    /// Human-readable label of this [`Entry`].
    pub label: String,

    /// [`Category`] of this [`Entry`].
    pub category: Category,

    /// Position of this [`Entry`] in listings.
    #[serde(default)]
    pub sort_order: i32,

    /// Price of this [`Entry`], if it has a fixed one.
    #[serde(default, rename = "price_eur")]
    pub price: Option<Money>,
}

impl Entry {
    /// Indicates whether this [`Entry`] is a package selectable for an
    /// offer.
    #[must_use]
    pub fn is_package(&self) -> bool {
        self.category.is_package()
    }
}

/// Unique slug of a pricing [`Entry`].
#[derive(
    AsRef, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct Key(String);

impl Key {
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
        Self::new(s).ok_or("invalid pricing `Entry` key")
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Group of pricing [`Entry`]s.
#[derive(
    AsRef,
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Name of the [`Category`] holding packages.
    pub const PACKAGE: &'static str = "package";

    /// Creates a new [`Category`] out of the provided `name`.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    /// Returns the [`Category`] holding packages.
    #[must_use]
    pub fn package() -> Self {
        Self(Self::PACKAGE.to_owned())
    }

    /// Indicates whether this [`Category`] holds packages.
    #[must_use]
    pub fn is_package(&self) -> bool {
        self.0 == Self::PACKAGE
    }
}

#[cfg(test)]
mod spec {
    use super::{Category, Entry, Key};

    #[test]
    fn recognizes_packages() {
        let entry: Entry = serde_json::from_str(
            r#"{
                "key": "besichtigung",
                "label": "Vor-Ort-Besichtigung",
                "category": "package",
                "price_eur": 350
            }"#,
        )
        .unwrap();

        assert!(entry.is_package());
        assert_eq!(entry.key, Key::new("besichtigung").unwrap());
        assert_eq!(entry.price.map(|p| p.amount()), Some(350));
        assert!(!Category::new("base").is_package());
        assert!(Category::new(" Package ").is_package());
    }
}
