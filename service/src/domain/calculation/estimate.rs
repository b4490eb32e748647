//! Remaining useful life [`Estimate`]s.

use derive_more::{Display, Error};
use rust_decimal::{prelude::ToPrimitive as _, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::{property_type::Gnd, FormulaSet, PropertyType};

use super::{Recommendation, Score, Year};

/// Maximum age of a property in years taken into account.
pub const MAX_AGE: u16 = 75;

/// Width of an [`Interval`] band in years.
const INTERVAL_STEP: u16 = 5;

/// Remaining useful life from which an assessment is recommended.
const ENGAGEMENT_THRESHOLD: u16 = 25;

/// Years describing an estimated property.
#[derive(Clone, Copy, Debug, Default)]
pub struct Subject {
    /// Explicitly provided total useful life, overriding the one of the
    /// [`PropertyType`].
    pub gnd_override: Option<i32>,

    /// Year the property was constructed.
    pub construction_year: Option<Year>,

    /// Year the property was acquired.
    pub acquisition_year: Option<Year>,

    /// Tax year the estimation is made for.
    pub tax_year: Option<Year>,
}

impl Subject {
    /// Validates this [`Subject`] against the provided [`PropertyType`].
    ///
    /// # Errors
    ///
    /// With an [`InvalidSubject`] naming the first invalid value.
    pub fn resolve(
        self,
        property_type: &PropertyType,
    ) -> Result<Resolved, InvalidSubject> {
        use InvalidSubject as E;

        let gnd = self
            .gnd_override
            .filter(|gnd| *gnd > 0)
            .map_or(property_type.gnd.map(i32::from), Some)
            .filter(|gnd| *gnd > 0)
            .and_then(|gnd| Gnd::try_from(gnd).ok())
            .ok_or(E::Gnd)?;

        let positive = |year: Option<Year>| year.filter(|y| *y > 0);
        let construction_year =
            positive(self.construction_year).ok_or(E::ConstructionYear)?;
        let acquisition_year =
            positive(self.acquisition_year).ok_or(E::AcquisitionYear)?;
        let tax_year = positive(self.tax_year).ok_or(E::TaxYear)?;

        Ok(Resolved {
            gnd,
            construction_year,
            acquisition_year,
            tax_year,
        })
    }
}

/// Invalid value of a [`Subject`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum InvalidSubject {
    /// Total useful life is neither provided nor configured.
    #[display("total useful life is not resolvable")]
    Gnd,

    /// Construction year is missing or not positive.
    #[display("construction year is required")]
    ConstructionYear,

    /// Acquisition year is missing or not positive.
    #[display("acquisition year is required")]
    AcquisitionYear,

    /// Tax year is missing or not positive.
    #[display("tax year is required")]
    TaxYear,
}

/// Validated [`Subject`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Resolved {
    /// Effective total useful life in years.
    pub gnd: Gnd,

    /// Year the property was constructed.
    pub construction_year: Year,

    /// Year the property was acquired.
    pub acquisition_year: Year,

    /// Tax year the estimation is made for.
    pub tax_year: Year,
}

impl Resolved {
    /// Estimates the remaining useful life for the provided [`Score`].
    ///
    /// The `formula` is expected to be the one found for the `score`.
    #[must_use]
    pub fn estimate(
        &self,
        score: Score,
        formula: Option<&FormulaSet>,
    ) -> Estimate {
        let Self {
            gnd,
            construction_year,
            acquisition_year,
            tax_year,
        } = *self;
        debug_assert!(formula.map_or(true, |f| f.score == score));

        let determination_year = acquisition_year.max(tax_year);
        let capped_determination_year =
            determination_year.min(construction_year + i32::from(MAX_AGE));
        let age_original = years_between(construction_year, determination_year);
        let age = years_between(construction_year, capped_determination_year);

        let gnd_dec = Decimal::from(gnd);
        let age_dec = Decimal::from(age);
        let relative_age = age_dec / gnd_dec;

        let use_advanced_formula = formula.is_some_and(|f| {
            relative_age >= f.min_relative_age.unwrap_or_default()
                || age >= f.age_threshold.unwrap_or_default()
        });
        let regression = formula
            .filter(|_| use_advanced_formula)
            .and_then(FormulaSet::coefficients)
            .map(|(a, b, c)| {
                a * (age_dec * age_dec / gnd_dec) - b * age_dec + c * gnd_dec
            });
        let value = regression
            .unwrap_or_else(|| (gnd_dec - age_dec).max(Decimal::ZERO))
            .clamp(Decimal::ZERO, gnd_dec);
        let rnd_years = round2(value);

        let interval = Interval::band(rnd_years, gnd);
        let recommendation = (rnd_years > Decimal::ZERO).then(|| {
            if rnd_years >= Decimal::from(ENGAGEMENT_THRESHOLD) {
                Recommendation::Engage
            } else {
                Recommendation::Decline
            }
        });

        Estimate {
            gnd,
            determination_year,
            capped_determination_year,
            age_original,
            age,
            relative_age,
            use_advanced_formula,
            rnd_years,
            interval,
            afa_percent: afa(rnd_years),
            afa_percent_from: afa(Decimal::from(interval.max)),
            afa_percent_to: afa(Decimal::from(interval.min)),
            recommendation,
        }
    }
}

/// Estimated remaining useful life of a property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Estimate {
    /// Effective total useful life in years.
    pub gnd: Gnd,

    /// Year the estimation is determined at.
    pub determination_year: Year,

    /// Determination year capped at [`MAX_AGE`] years after the construction.
    pub capped_determination_year: Year,

    /// Uncapped age of the property.
    pub age_original: u16,

    /// Age of the property capped at [`MAX_AGE`].
    pub age: u16,

    /// Ratio of the `age` to the `gnd`.
    pub relative_age: Decimal,

    /// Indicator whether the regression formula was applied.
    pub use_advanced_formula: bool,

    /// Remaining useful life in years, rounded to 2 fraction digits.
    pub rnd_years: Decimal,

    /// Banded [`Interval`] of the `rnd_years`.
    pub interval: Interval,

    /// Depreciation rate in percents.
    pub afa_percent: Option<Decimal>,

    /// Lower depreciation rate bound, derived from the upper [`Interval`]
    /// bound.
    pub afa_percent_from: Option<Decimal>,

    /// Upper depreciation rate bound, derived from the lower [`Interval`]
    /// bound.
    pub afa_percent_to: Option<Decimal>,

    /// Issued [`Recommendation`], if any.
    pub recommendation: Option<Recommendation>,
}

/// Banded range of a remaining useful life in whole years.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct Interval {
    /// Lower bound.
    pub min: u16,

    /// Upper bound.
    pub max: u16,
}

impl Interval {
    /// Bands the provided remaining useful life into [`INTERVAL_STEP`]-wide
    /// [`Interval`] not exceeding the `gnd`.
    #[must_use]
    pub fn band(rnd_years: Decimal, gnd: Gnd) -> Self {
        if rnd_years <= Decimal::ZERO {
            return Self::default();
        }

        let step = Decimal::from(INTERVAL_STEP);
        let bound = |v: Decimal| v.to_u16().unwrap_or(gnd).min(gnd);

        let min = bound((rnd_years / step).floor() * step);
        let mut max = bound((rnd_years / step).ceil() * step);
        if max.saturating_sub(min) < INTERVAL_STEP {
            max = gnd.min(min.saturating_add(INTERVAL_STEP));
        }
        Self {
            min,
            max: max.max(min),
        }
    }
}

/// Calculates the depreciation rate for the provided remaining useful life.
///
/// [`None`] is returned if the remaining useful life is not positive.
#[must_use]
pub fn afa(rnd_years: Decimal) -> Option<Decimal> {
    (rnd_years > Decimal::ZERO).then(|| round2(Decimal::ONE_HUNDRED / rnd_years))
}

/// Rounds the provided [`Decimal`] to 2 fraction digits.
fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Counts whole years passed `from` the one year `to` another, saturating at
/// zero.
fn years_between(from: Year, to: Year) -> u16 {
    u16::try_from((to - from).max(0)).unwrap_or(u16::MAX)
}
