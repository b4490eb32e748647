//! Renovation [`Category`] definitions.

use std::{collections::BTreeMap, str::FromStr, sync::LazyLock};

use common::define_kind;
use derive_more::{AsRef, Display};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Part of a property whose renovation history contributes to a score.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Category {
    /// Unique [`Key`] of this [`Category`].
    pub key: Key,

    /// Human-readable label of this [`Category`].
    pub label: String,

    /// Maximum points this [`Category`] is able to contribute.
    pub max_points: Decimal,

    /// Multipliers in `[0, 1]` range per [`TimeWindow`].
    pub time_factors: BTreeMap<TimeWindow, Decimal>,

    /// Position of this [`Category`] in listings.
    pub sort_order: i32,
}

impl Category {
    /// Resolves the time factor of this [`Category`] for the provided
    /// [`TimeWindow`].
    ///
    /// Renovations that never happened, or whose time is unknown, contribute
    /// nothing.
    #[must_use]
    pub fn time_factor(&self, window: TimeWindow) -> Decimal {
        match window {
            TimeWindow::Never | TimeWindow::Unknown => Decimal::ZERO,
            TimeWindow::UpTo5Years
            | TimeWindow::UpTo10Years
            | TimeWindow::UpTo15Years
            | TimeWindow::UpTo20Years
            | TimeWindow::Over20Years => self
                .time_factors
                .get(&window)
                .copied()
                .unwrap_or(Decimal::ZERO),
        }
    }
}

/// Unique slug of a renovation [`Category`].
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
        Self::new(s).ok_or("invalid renovation `Category` key")
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

define_kind! {
    #[doc = "Bucketed recency of a renovation."]
    enum TimeWindow {
        #[doc = "Never renovated."]
        #[key = "nicht"]
        Never = 1,

        #[doc = "Renovated within the last 5 years."]
        #[key = "bis_5"]
        UpTo5Years = 2,

        #[doc = "Renovated within the last 10 years."]
        #[key = "bis_10"]
        UpTo10Years = 3,

        #[doc = "Renovated within the last 15 years."]
        #[key = "bis_15"]
        UpTo15Years = 4,

        #[doc = "Renovated within the last 20 years."]
        #[key = "bis_20"]
        UpTo20Years = 5,

        #[doc = "Renovated more than 20 years ago."]
        #[key = "ueber_20"]
        Over20Years = 6,

        #[doc = "Unknown whether or when renovated."]
        #[key = "weiss_nicht"]
        Unknown = 7,
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::Never
    }
}

/// Completeness of renovation works in a [`Category`], in percents.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(transparent)]
pub struct Extent(u8);

impl Extent {
    /// No renovation works at all.
    pub const NONE: Self = Self(0);

    /// Creates a new [`Extent`] if the provided `percent` is within
    /// `[0, 100]` range.
    #[must_use]
    pub fn new(percent: u8) -> Option<Self> {
        (percent <= 100).then_some(Self(percent))
    }

    /// Returns the percent value of this [`Extent`].
    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Extent {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let percent = u8::deserialize(d)?;
        Self::new(percent).ok_or_else(|| {
            serde::de::Error::custom(format!("extent out of range: {percent}"))
        })
    }
}

/// Table of weight multipliers per [`Extent`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtentWeights(BTreeMap<Extent, Decimal>);

impl ExtentWeights {
    /// Resolves the weight of the provided [`Extent`].
    ///
    /// Extents missing in the table weigh proportionally to their percent.
    #[must_use]
    pub fn weight(&self, extent: Extent) -> Decimal {
        self.0.get(&extent).copied().unwrap_or_else(|| {
            Decimal::from(extent.percent()) / Decimal::ONE_HUNDRED
        })
    }

    /// Iterates over the configured weights.
    pub fn iter(&self) -> impl Iterator<Item = (Extent, Decimal)> + '_ {
        self.0.iter().map(|(e, w)| (*e, *w))
    }
}

impl FromIterator<(Extent, Decimal)> for ExtentWeights {
    fn from_iter<I: IntoIterator<Item = (Extent, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Renovation history of a single [`Category`] as provided by a customer.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
#[serde(default)]
pub struct Input {
    /// [`TimeWindow`] of the last renovation.
    #[serde(rename = "time_window_key")]
    pub time_window: TimeWindow,

    /// [`Extent`] of the renovation works.
    #[serde(rename = "extent_percent")]
    pub extent: Extent,
}

/// Renovation history of a property keyed by [`Category`].
pub type Inputs = BTreeMap<Key, Input>;

#[cfg(test)]
mod spec {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::{Category, Extent, ExtentWeights, Input, Key, TimeWindow};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn never_and_unknown_windows_contribute_nothing() {
        let category = Category {
            key: Key::new("heizung").unwrap(),
            label: "Heizung".into(),
            max_points: Decimal::TWO,
            time_factors: TimeWindow::ALL
                .iter()
                .map(|w| (*w, Decimal::ONE))
                .collect(),
            sort_order: 0,
        };

        assert_eq!(category.time_factor(TimeWindow::Never), Decimal::ZERO);
        assert_eq!(category.time_factor(TimeWindow::Unknown), Decimal::ZERO);
        assert_eq!(category.time_factor(TimeWindow::UpTo5Years), Decimal::ONE);
    }

    #[test]
    fn missing_time_factor_is_zero() {
        let category = Category {
            key: Key::new("heizung").unwrap(),
            label: "Heizung".into(),
            max_points: Decimal::TWO,
            time_factors: BTreeMap::from([(
                TimeWindow::UpTo10Years,
                decimal("0.8"),
            )]),
            sort_order: 0,
        };

        assert_eq!(
            category.time_factor(TimeWindow::UpTo10Years),
            decimal("0.8"),
        );
        assert_eq!(category.time_factor(TimeWindow::UpTo20Years), Decimal::ZERO);
    }

    #[test]
    fn extent_weight_falls_back_to_percent() {
        let weights = ExtentWeights::from_iter([(
            Extent::new(60).unwrap(),
            decimal("0.5"),
        )]);

        assert_eq!(weights.weight(Extent::new(60).unwrap()), decimal("0.5"));
        assert_eq!(weights.weight(Extent::new(80).unwrap()), decimal("0.8"));
        assert_eq!(weights.weight(Extent::NONE), Decimal::ZERO);
    }

    #[test]
    fn extent_is_bounded() {
        assert!(Extent::new(100).is_some());
        assert!(Extent::new(101).is_none());
    }

    #[test]
    fn deserializes_input() {
        let input: Input = serde_json::from_str(
            r#"{"time_window_key": "bis_10", "extent_percent": 60}"#,
        )
        .unwrap();

        assert_eq!(input.time_window, TimeWindow::UpTo10Years);
        assert_eq!(input.extent.percent(), 60);

        let input: Input = serde_json::from_str("{}").unwrap();
        assert_eq!(input, Input::default());
        assert!(serde_json::from_str::<Input>(
            r#"{"time_window_key": "bald"}"#
        )
        .is_err());
    }
}
