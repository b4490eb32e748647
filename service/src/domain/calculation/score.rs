//! Renovation [`Score`] calculation.

use std::collections::BTreeMap;

use derive_more::Display;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::renovation::{
    self, Category, Extent, ExtentWeights, TimeWindow,
};

/// Weighted renovation score in `[0, 20]` range with `0.5` granularity.
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
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct Score(Decimal);

impl Score {
    /// Returns the maximum possible [`Score`].
    #[must_use]
    pub fn max() -> Self {
        Self(Decimal::from(20))
    }

    /// Creates a new [`Score`] if the provided `value` is a multiple of `0.5`
    /// within `[0, 20]` range.
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        let valid = (Decimal::ZERO..=Self::max().0).contains(&value)
            && (value * Decimal::TWO).fract().is_zero();
        valid.then(|| Self(value.normalize()))
    }

    /// Rounds the provided raw points to the nearest [`Score`].
    #[must_use]
    pub fn from_raw(raw: Decimal) -> Self {
        let doubled = (raw * Decimal::TWO)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Self(
            (doubled / Decimal::TWO)
                .clamp(Decimal::ZERO, Self::max().0)
                .normalize(),
        )
    }

    /// Returns the numeric value of this [`Score`].
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(d)?;
        Self::new(value).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid `Score`: {value}"))
        })
    }
}

/// Contribution of a single renovation [`Category`] to a [`Score`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CategoryScore {
    /// Label of the [`Category`].
    pub label: String,

    /// Maximum points of the [`Category`].
    pub max_points: Decimal,

    /// [`Extent`] the points were calculated with.
    pub extent_percent: Extent,

    /// Resolved weight of the [`Extent`].
    pub extent_weight: Decimal,

    /// [`TimeWindow`] the points were calculated with.
    pub time_window_key: TimeWindow,

    /// Resolved factor of the [`TimeWindow`].
    pub time_factor: Decimal,

    /// Contributed points, rounded to 2 fraction digits.
    pub points: Decimal,
}

/// Per-[`Category`] contributions to a [`Score`].
pub type Details = BTreeMap<renovation::Key, CategoryScore>;

/// Outcome of [`score()`]ing a renovation history.
#[derive(Clone, Debug, PartialEq)]
pub struct Scoring {
    /// Rounded [`Score`].
    pub score: Score,

    /// Sum of unrounded points.
    pub raw: Decimal,

    /// Per-[`Category`] [`Details`].
    pub details: Details,
}

/// Scores the provided renovation history.
///
/// Every known [`Category`] is scored, and a [`Category`] missing in the
/// `inputs` contributes nothing.
#[must_use]
pub fn score(
    categories: &[Category],
    weights: &ExtentWeights,
    inputs: &renovation::Inputs,
) -> Scoring {
    let mut raw = Decimal::ZERO;
    let details = categories
        .iter()
        .map(|category| {
            let input = inputs.get(&category.key).copied().unwrap_or_default();
            let extent_weight = weights.weight(input.extent);
            let time_factor = category.time_factor(input.time_window);

            let points = category.max_points * extent_weight * time_factor;
            raw += points;

            let detail = CategoryScore {
                label: category.label.clone(),
                max_points: category.max_points,
                extent_percent: input.extent,
                extent_weight,
                time_window_key: input.time_window,
                time_factor,
                points: points.round_dp_with_strategy(
                    2,
                    RoundingStrategy::MidpointAwayFromZero,
                ),
            };
            (category.key.clone(), detail)
        })
        .collect();

    Scoring {
        score: Score::from_raw(raw),
        raw,
        details,
    }
}

#[cfg(test)]
pub(crate) mod spec {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use crate::domain::renovation::{
        Category, Extent, ExtentWeights, Input, Inputs, Key, TimeWindow,
    };

    use super::{score, Score};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    /// Builds a [`Category`] with the provided factors per window.
    fn category(
        key: &str,
        max_points: u8,
        factors: &[(TimeWindow, &str)],
    ) -> Category {
        Category {
            key: Key::new(key).unwrap(),
            label: key.to_owned(),
            max_points: Decimal::from(max_points),
            time_factors: factors
                .iter()
                .map(|(w, f)| (*w, decimal(f)))
                .collect(),
            sort_order: 0,
        }
    }

    /// Categories calibrated against real customer assessments.
    pub(crate) fn calibrated_categories() -> Vec<Category> {
        use TimeWindow as W;

        vec![
            category(
                "baeder_wc",
                2,
                &[(W::UpTo5Years, "1"), (W::UpTo10Years, "0.5")],
            ),
            category(
                "innenausbau",
                2,
                &[
                    (W::UpTo5Years, "1"),
                    (W::UpTo10Years, "1"),
                    (W::UpTo15Years, "1"),
                    (W::UpTo20Years, "0.5"),
                ],
            ),
            category(
                "fenster_tueren",
                2,
                &[
                    (W::UpTo5Years, "1"),
                    (W::UpTo10Years, "1"),
                    (W::UpTo15Years, "0.5"),
                ],
            ),
            category(
                "heizung",
                2,
                &[
                    (W::UpTo5Years, "1"),
                    (W::UpTo10Years, "1"),
                    (W::UpTo15Years, "0.5"),
                ],
            ),
            category(
                "leitungen",
                2,
                &[
                    (W::UpTo5Years, "1"),
                    (W::UpTo10Years, "1"),
                    (W::UpTo15Years, "1"),
                    (W::UpTo20Years, "0.5"),
                ],
            ),
            category(
                "dach_waermeschutz",
                4,
                &[
                    (W::UpTo5Years, "1"),
                    (W::UpTo10Years, "0.75"),
                    (W::UpTo15Years, "0.5"),
                    (W::UpTo20Years, "0.25"),
                ],
            ),
            category(
                "aussenwaende",
                4,
                &[
                    (W::UpTo5Years, "1"),
                    (W::UpTo10Years, "0.75"),
                    (W::UpTo15Years, "0.5"),
                    (W::UpTo20Years, "0.25"),
                ],
            ),
        ]
    }

    /// Extent weights proportional to the extent.
    pub(crate) fn linear_weights() -> ExtentWeights {
        [0, 20, 40, 60, 80, 100]
            .into_iter()
            .map(|p| {
                (
                    Extent::new(p).unwrap(),
                    Decimal::from(p) / Decimal::ONE_HUNDRED,
                )
            })
            .collect()
    }

    pub(crate) fn inputs(items: &[(&str, TimeWindow, u8)]) -> Inputs {
        items
            .iter()
            .map(|(key, time_window, extent)| {
                (
                    Key::new(*key).unwrap(),
                    Input {
                        time_window: *time_window,
                        extent: Extent::new(*extent).unwrap(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn scores_calibration_scenario() {
        use TimeWindow as W;

        let scoring = score(
            &calibrated_categories(),
            &linear_weights(),
            &inputs(&[
                ("baeder_wc", W::UpTo5Years, 60),
                ("innenausbau", W::UpTo5Years, 100),
                ("fenster_tueren", W::UpTo5Years, 80),
                ("heizung", W::UpTo10Years, 60),
                ("leitungen", W::UpTo10Years, 20),
                ("dach_waermeschutz", W::Unknown, 0),
                ("aussenwaende", W::Never, 0),
            ]),
        );

        assert_eq!(scoring.raw, decimal("6.4"));
        assert_eq!(scoring.score.value(), decimal("6.5"));

        let points = |key: &str| scoring.details[&Key::new(key).unwrap()].points;
        assert_eq!(points("baeder_wc"), decimal("1.2"));
        assert_eq!(points("innenausbau"), decimal("2"));
        assert_eq!(points("fenster_tueren"), decimal("1.6"));
        assert_eq!(points("heizung"), decimal("1.2"));
        assert_eq!(points("leitungen"), decimal("0.4"));
        assert_eq!(points("dach_waermeschutz"), Decimal::ZERO);
        assert_eq!(points("aussenwaende"), Decimal::ZERO);
    }

    #[test]
    fn scores_customer_matrix() {
        use TimeWindow as W;

        let scoring = score(
            &calibrated_categories(),
            &linear_weights(),
            &inputs(&[
                ("baeder_wc", W::UpTo10Years, 100),
                ("innenausbau", W::UpTo15Years, 80),
                ("fenster_tueren", W::UpTo15Years, 60),
                ("heizung", W::UpTo20Years, 40),
                ("leitungen", W::UpTo15Years, 60),
                ("dach_waermeschutz", W::UpTo10Years, 100),
                ("aussenwaende", W::UpTo20Years, 80),
            ]),
        );

        assert_eq!(scoring.raw, decimal("8.2"));
        assert_eq!(scoring.score.value(), decimal("8"));

        let heizung = &scoring.details[&Key::new("heizung").unwrap()];
        assert_eq!(heizung.points, Decimal::ZERO);
        let aussen = &scoring.details[&Key::new("aussenwaende").unwrap()];
        assert_eq!(aussen.time_factor, decimal("0.25"));
        assert_eq!(aussen.extent_weight, decimal("0.8"));
    }

    #[test]
    fn missing_inputs_contribute_nothing() {
        let scoring = score(
            &calibrated_categories(),
            &linear_weights(),
            &BTreeMap::new(),
        );

        assert_eq!(scoring.raw, Decimal::ZERO);
        assert_eq!(scoring.score, Score::default());
        assert_eq!(scoring.details.len(), 7);
        for detail in scoring.details.values() {
            assert_eq!(detail.points, Decimal::ZERO);
            assert_eq!(detail.time_window_key, TimeWindow::Never);
            assert_eq!(detail.extent_percent, Extent::NONE);
        }
    }

    #[test]
    fn ignores_unknown_categories() {
        let scoring = score(
            &calibrated_categories(),
            &linear_weights(),
            &inputs(&[("keller", TimeWindow::UpTo5Years, 100)]),
        );

        assert_eq!(scoring.raw, Decimal::ZERO);
        assert!(!scoring.details.contains_key(&Key::new("keller").unwrap()));
    }

    #[test]
    fn rounds_to_half_points() {
        assert_eq!(Score::from_raw(decimal("6.24")).value(), decimal("6"));
        assert_eq!(Score::from_raw(decimal("6.25")).value(), decimal("6.5"));
        assert_eq!(Score::from_raw(decimal("6.74")).value(), decimal("6.5"));
        assert_eq!(Score::from_raw(decimal("6.75")).value(), decimal("7"));
        assert_eq!(Score::from_raw(decimal("35")).value(), decimal("20"));
        assert_eq!(Score::from_raw(decimal("-3")).value(), Decimal::ZERO);
    }

    #[test]
    fn validates_score() {
        assert!(Score::new(decimal("6.5")).is_some());
        assert!(Score::new(decimal("20")).is_some());
        assert!(Score::new(decimal("0")).is_some());

        assert!(Score::new(decimal("6.3")).is_none());
        assert!(Score::new(decimal("20.5")).is_none());
        assert!(Score::new(decimal("-0.5")).is_none());
    }

    fn any_window() -> impl Strategy<Value = TimeWindow> {
        proptest::sample::select(TimeWindow::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn score_is_bounded_half_step(
            picks in proptest::collection::vec(
                (any_window(), 0_u8..=100, 0_u32..=50),
                7,
            ),
        ) {
            let categories = calibrated_categories()
                .into_iter()
                .zip(&picks)
                .map(|(mut c, (_, _, max))| {
                    // Inflate points to push raw sums beyond the maximum.
                    c.max_points = Decimal::from(*max);
                    c
                })
                .collect::<Vec<_>>();
            let inputs = categories
                .iter()
                .zip(&picks)
                .map(|(c, (w, e, _))| {
                    (c.key.clone(), Input {
                        time_window: *w,
                        extent: Extent::new(*e).unwrap(),
                    })
                })
                .collect();

            let scoring = score(&categories, &ExtentWeights::default(), &inputs);
            let value = scoring.score.value();

            prop_assert!(value >= Decimal::ZERO);
            prop_assert!(value <= Decimal::from(20));
            prop_assert!((value * Decimal::TWO).fract().is_zero());
        }
    }
}
