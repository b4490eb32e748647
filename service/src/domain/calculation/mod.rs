//! [`Calculation`] definitions.

pub mod estimate;
pub mod score;

use std::fmt;

use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    customer::{self, Billing, Contact},
    property_type, renovation, FormulaSet,
};

pub use self::{
    estimate::{Estimate, Interval},
    score::{Details as ScoreDetails, Score},
};

/// Result of a single remaining useful life estimation run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Calculation {
    /// ID of this [`Calculation`].
    pub id: Id,

    /// [`PublicRef`] of this [`Calculation`] shared with customers.
    pub public_ref: PublicRef,

    /// Key of the estimated [`PropertyType`].
    ///
    /// [`PropertyType`]: crate::domain::PropertyType
    pub property_type_key: property_type::Key,

    /// Effective total useful life in years.
    pub gnd: property_type::Gnd,

    /// Year the property was constructed.
    pub construction_year: Year,

    /// Year the property was acquired.
    pub acquisition_year: Year,

    /// Tax year the estimation is made for.
    pub tax_year: Year,

    /// Year the estimation is determined at.
    pub determination_year: Year,

    /// Age of the property in years, capped at [`estimate::MAX_AGE`].
    pub age: u16,

    /// Renovation [`Score`] of the property.
    pub score: Score,

    /// Per-category [`ScoreDetails`].
    pub score_details: ScoreDetails,

    /// Structured [`Inputs`] this [`Calculation`] was made from.
    pub inputs: Inputs,

    /// Debug [`Trace`] of this [`Calculation`].
    pub trace: Trace,

    /// Estimated remaining useful life in years.
    pub rnd_years: Decimal,

    /// Banded [`Interval`] of the remaining useful life.
    pub interval: Option<Interval>,

    /// Depreciation rate in percents.
    pub afa_percent: Option<Decimal>,

    /// [`Recommendation`] issued for this [`Calculation`].
    pub recommendation: Option<Recommendation>,

    /// [`DateTime`] when this [`Calculation`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,
}

impl Calculation {
    /// Lowest interval bound shown to customers.
    const DISPLAY_MIN: u16 = 15;

    /// Highest interval bound shown to customers when the real interval is
    /// clamped.
    const DISPLAY_MAX: u16 = 25;

    /// Returns the human-readable label of the remaining useful life
    /// [`Interval`].
    ///
    /// Short intervals are displayed as `15 – 25` years without affecting the
    /// stored bounds.
    #[must_use]
    pub fn interval_label(&self) -> Option<String> {
        let Interval { mut min, mut max } = self.interval?;
        if max < Self::DISPLAY_MAX || min < Self::DISPLAY_MIN {
            min = Self::DISPLAY_MIN;
            max = Self::DISPLAY_MAX;
        }
        Some(if min == max {
            format!("rd. {min} Jahre")
        } else {
            format!("rd. {min} – {max} Jahre")
        })
    }

    /// Returns the lower depreciation rate bound, derived from the upper
    /// [`Interval`] bound.
    #[must_use]
    pub fn afa_percent_from(&self) -> Option<Decimal> {
        let denominator = self
            .interval
            .map_or(self.rnd_years, |i| Decimal::from(i.max));
        estimate::afa(denominator)
    }

    /// Returns the upper depreciation rate bound, derived from the lower
    /// [`Interval`] bound.
    #[must_use]
    pub fn afa_percent_to(&self) -> Option<Decimal> {
        let denominator = self
            .interval
            .map_or(self.rnd_years, |i| Decimal::from(i.min));
        estimate::afa(denominator)
    }

    /// Returns the human-readable label of the depreciation rate range.
    #[must_use]
    pub fn afa_percent_label(&self) -> Option<String> {
        let (from, to) = (self.afa_percent_from(), self.afa_percent_to());
        let label = match (from, to) {
            (Some(from), Some(to)) => {
                if (from - to).abs() < Decimal::new(1, 2) {
                    format!("rd. {} %", GermanDecimal(from))
                } else {
                    format!(
                        "rd. {} – {} %",
                        GermanDecimal(from),
                        GermanDecimal(to),
                    )
                }
            }
            (Some(v), None) | (None, Some(v)) => {
                format!("rd. {} %", GermanDecimal(v))
            }
            (None, None) => return None,
        };
        Some(label)
    }
}

/// [`Decimal`] formatted with two fraction digits, a decimal comma and dots
/// grouping thousands.
struct GermanDecimal(Decimal);

impl fmt::Display for GermanDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let raw = format!("{:.2}", rounded.abs());
        let (int, frac) = raw.split_once('.').unwrap_or((&raw, "00"));

        if rounded.is_sign_negative() && !rounded.is_zero() {
            f.write_str("-")?;
        }
        for (i, digit) in int.chars().enumerate() {
            if i > 0 && (int.len() - i) % 3 == 0 {
                f.write_str(".")?;
            }
            write!(f, "{digit}")?;
        }
        write!(f, ",{frac}")
    }
}

/// ID of a [`Calculation`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Unguessable public reference of a [`Calculation`].
#[derive(
    AsRef, Clone, Debug, Display, Eq, Hash, PartialEq, Serialize,
)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct PublicRef(String);

impl PublicRef {
    /// Length of a [`PublicRef`].
    pub const LENGTH: usize = 32;

    /// Generates a new random [`PublicRef`].
    #[must_use]
    pub fn generate() -> Self {
        Self(crate::domain::random_token(Self::LENGTH))
    }

    /// Creates a new [`PublicRef`] if the given `reference` is valid.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Option<Self> {
        let reference = reference.into();
        Self::check(&reference).then_some(Self(reference))
    }

    /// Checks whether the given `reference` is a valid [`PublicRef`].
    fn check(reference: impl AsRef<str>) -> bool {
        let reference = reference.as_ref();
        reference.len() == Self::LENGTH
            && reference.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl FromStr for PublicRef {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `calculation::PublicRef`")
    }
}

impl<'de> Deserialize<'de> for PublicRef {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Calendar year.
pub type Year = i32;

define_kind! {
    #[doc = "Recommendation whether to engage an assessment."]
    enum Recommendation {
        #[doc = "Assessment is worth it, engagement is recommended."]
        #[key = "engage"]
        Engage = 1,

        #[doc = "Assessment is not worth it, engagement is not offered."]
        #[key = "decline"]
        Decline = 2,
    }
}

impl Recommendation {
    /// Returns the message of this [`Recommendation`] shown to customers.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Engage => "Gutachten ist sinnvoll, Beauftragung empfehlen",
            Self::Decline => {
                "Gutachten ist nicht sinnvoll, keine Beauftragung ermöglichen"
            }
        }
    }
}

/// Structured inputs a [`Calculation`] was made from.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Inputs {
    /// Key of the chosen [`PropertyType`].
    ///
    /// [`PropertyType`]: crate::domain::PropertyType
    pub property_type_key: Option<property_type::Key>,

    /// Explicitly provided total useful life, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnd_override: Option<i32>,

    /// Year the property was constructed.
    #[serde(rename = "baujahr")]
    pub construction_year: Year,

    /// Year the property was acquired.
    #[serde(rename = "anschaffungsjahr")]
    pub acquisition_year: Year,

    /// Tax year the estimation is made for.
    #[serde(rename = "steuerjahr")]
    pub tax_year: Year,

    /// Year the estimation is determined at.
    #[serde(rename = "ermittlungsjahr")]
    pub determination_year: Year,

    /// Construction style of the property.
    #[serde(default, rename = "bauweise")]
    pub construction_style: Option<String>,

    /// Indicator whether the property is occupied by its owner.
    #[serde(default, rename = "eigennutzung")]
    pub owner_occupied: Option<bool>,

    /// Renovation history of the property.
    #[serde(default)]
    pub renovations: renovation::Inputs,

    /// [`Address`] of the property.
    #[serde(default)]
    pub address: Option<Address>,

    /// [`Contact`] of the requester.
    #[serde(default)]
    pub contact: Contact,

    /// [`Billing`] address of the requester.
    #[serde(default)]
    pub billing_address: Option<Billing>,

    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Postal address of an estimated property.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Address {
    /// Street with a house number.
    pub street: Option<String>,

    /// Postal code.
    pub zip: Option<String>,

    /// City.
    pub city: Option<String>,

    /// Country code.
    pub country: Option<String>,
}

impl Address {
    /// Normalizes this [`Address`] by trimming its parts and dropping the
    /// blank ones.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            street: customer::non_blank(self.street),
            zip: customer::non_blank(self.zip),
            city: customer::non_blank(self.city),
            country: customer::non_blank(self.country),
        }
    }
}

/// Debug trace of a [`Calculation`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Trace {
    /// Unrounded renovation score, with 4 fraction digits.
    pub score_raw: Decimal,

    /// Rounded renovation [`Score`].
    pub score_rounded: Score,

    /// Ratio of the age to the total useful life, with 4 fraction digits.
    pub relative_age: Decimal,

    /// Determination year, capped at [`estimate::MAX_AGE`] years after the
    /// construction.
    #[serde(rename = "ermittlungsjahr_for_calculation")]
    pub capped_determination_year: Year,

    /// Uncapped age of the property.
    #[serde(rename = "alter_original")]
    pub age_original: u16,

    /// Capped age of the property.
    #[serde(rename = "alter_capped")]
    pub age: u16,

    /// Lower depreciation rate bound.
    pub afa_percent_from: Option<Decimal>,

    /// Upper depreciation rate bound.
    pub afa_percent_to: Option<Decimal>,

    /// Depreciation rate.
    #[serde(rename = "afa_percent_single")]
    pub afa_percent: Option<Decimal>,

    /// Indicator whether the regression formula was applied.
    pub use_advanced_formula: bool,

    /// [`FormulaSet`] found for the [`Score`], if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<FormulaSet>,
}

/// [`DateTime`] when a [`Calculation`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Calculation, unit::Creation)>;
