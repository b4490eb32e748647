//! [`FormulaSet`] definitions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::calculation::Score;

/// Regression coefficients estimating a remaining useful life of properties
/// with a specific renovation [`Score`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FormulaSet {
    /// [`Score`] this [`FormulaSet`] applies to.
    pub score: Score,

    /// Quadratic age coefficient.
    #[serde(default)]
    pub a: Option<Decimal>,

    /// Linear age coefficient.
    #[serde(default)]
    pub b: Option<Decimal>,

    /// Total useful life coefficient.
    #[serde(default)]
    pub c: Option<Decimal>,

    /// Age in years from which this [`FormulaSet`] applies.
    #[serde(default, rename = "alter_schwelle")]
    pub age_threshold: Option<u16>,

    /// Ratio of the age to the total useful life from which this
    /// [`FormulaSet`] applies.
    #[serde(default, rename = "rel_alter_min")]
    pub min_relative_age: Option<Decimal>,
}

impl FormulaSet {
    /// Returns `(a, b, c)` coefficients of this [`FormulaSet`], if all of them
    /// are configured.
    #[must_use]
    pub fn coefficients(&self) -> Option<(Decimal, Decimal, Decimal)> {
        Some((self.a?, self.b?, self.c?))
    }
}

#[cfg(test)]
mod spec {
    use rust_decimal::Decimal;

    use super::FormulaSet;

    #[test]
    fn deserializes_german_names() {
        let formula: FormulaSet = serde_json::from_str(
            r#"{
                "score": 6.5,
                "a": 0.5863,
                "b": 1.2783,
                "c": 1.0425,
                "alter_schwelle": 25,
                "rel_alter_min": 0.28
            }"#,
        )
        .unwrap();

        assert_eq!(formula.age_threshold, Some(25));
        assert_eq!(formula.min_relative_age, Some(Decimal::new(28, 2)));
        assert!(formula.coefficients().is_some());
    }

    #[test]
    fn requires_all_coefficients() {
        let formula: FormulaSet =
            serde_json::from_str(r#"{"score": 3, "a": 1, "b": 1}"#).unwrap();

        assert_eq!(formula.coefficients(), None);
        assert_eq!(formula.age_threshold, None);
        assert!(serde_json::from_str::<FormulaSet>(r#"{"score": 3.3}"#)
            .is_err());
    }
}
