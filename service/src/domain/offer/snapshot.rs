//! Snapshots frozen into an [`Offer`].
//!
//! [`Offer`]: super::Offer

use common::{Money, Percent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    calculation::{self, Recommendation, Score, Year},
    customer::{Billing, Contact, Email},
    discount_code, pricing, property_type, Calculation,
};

/// [`Calculation`] results as they were when an offer was created.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct CalculationSnapshot {
    /// [`calculation::PublicRef`] of the [`Calculation`].
    pub public_ref: Option<calculation::PublicRef>,

    /// Key of the estimated property type.
    pub property_type_key: Option<property_type::Key>,

    /// Label of the estimated property type.
    pub property_type_label: Option<String>,

    /// Effective total useful life in years.
    pub gnd: Option<property_type::Gnd>,

    /// Year the property was constructed.
    #[serde(rename = "baujahr")]
    pub construction_year: Option<Year>,

    /// Year the property was acquired.
    #[serde(rename = "anschaffungsjahr")]
    pub acquisition_year: Option<Year>,

    /// Tax year the estimation was made for.
    #[serde(rename = "steuerjahr")]
    pub tax_year: Option<Year>,

    /// Year the estimation was determined at.
    #[serde(rename = "ermittlungsjahr")]
    pub determination_year: Option<Year>,

    /// Capped age of the property.
    #[serde(rename = "alter")]
    pub age: Option<u16>,

    /// Renovation [`Score`].
    pub score: Option<Score>,

    /// Remaining useful life in years.
    pub rnd_years: Option<Decimal>,

    /// Lower bound of the remaining useful life interval.
    pub rnd_min: Option<u16>,

    /// Upper bound of the remaining useful life interval.
    pub rnd_max: Option<u16>,

    /// Human-readable remaining useful life interval.
    pub rnd_interval_label: Option<String>,

    /// Depreciation rate in percents.
    pub afa_percent: Option<Decimal>,

    /// Lower depreciation rate bound.
    pub afa_percent_from: Option<Decimal>,

    /// Upper depreciation rate bound.
    pub afa_percent_to: Option<Decimal>,

    /// Human-readable depreciation rate range.
    pub afa_percent_label: Option<String>,

    /// Issued [`Recommendation`].
    pub recommendation: Option<Recommendation>,
}

impl CalculationSnapshot {
    /// Freezes the provided [`Calculation`].
    #[must_use]
    pub fn new(calc: &Calculation, property_type_label: Option<String>) -> Self {
        Self {
            public_ref: Some(calc.public_ref.clone()),
            property_type_key: Some(calc.property_type_key.clone()),
            property_type_label,
            gnd: Some(calc.gnd),
            construction_year: Some(calc.construction_year),
            acquisition_year: Some(calc.acquisition_year),
            tax_year: Some(calc.tax_year),
            determination_year: Some(calc.determination_year),
            age: Some(calc.age),
            score: Some(calc.score),
            rnd_years: Some(calc.rnd_years),
            rnd_min: calc.interval.map(|i| i.min),
            rnd_max: calc.interval.map(|i| i.max),
            rnd_interval_label: calc.interval_label(),
            afa_percent: calc.afa_percent,
            afa_percent_from: calc.afa_percent_from(),
            afa_percent_to: calc.afa_percent_to(),
            afa_percent_label: calc.afa_percent_label(),
            recommendation: calc.recommendation,
        }
    }
}

/// Form inputs and pricing basis of an offer, refreshed on every mutation.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct InputSnapshot {
    /// Inputs of the [`Calculation`] the offer was created for.
    pub calculation_inputs: Option<calculation::Inputs>,

    /// [`CustomerSnapshot`] of the requester.
    pub customer: CustomerSnapshot,

    /// Keys of the selected add-ons.
    pub addons: Vec<pricing::Key>,

    /// [`PricingSnapshot`] the totals were computed from.
    pub pricing: PricingSnapshot,
}

impl InputSnapshot {
    /// Returns the [`Contact`] recorded in the [`Calculation`] inputs.
    #[must_use]
    pub fn calculation_contact(&self) -> Option<&Contact> {
        self.calculation_inputs.as_ref().map(|i| &i.contact)
    }
}

/// Customer details as entered for an offer.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CustomerSnapshot {
    /// Full name.
    pub name: Option<String>,

    /// [`Email`] address.
    pub email: Option<Email>,

    /// Phone number.
    pub phone: Option<String>,

    /// [`Billing`] address.
    pub billing_address: Option<Billing>,
}

impl CustomerSnapshot {
    /// Creates a new [`CustomerSnapshot`] out of the provided [`Contact`] and
    /// [`Billing`] address.
    #[must_use]
    pub fn new(contact: &Contact, billing_address: Option<Billing>) -> Self {
        Self {
            name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            billing_address,
        }
    }
}

/// Basis the totals of an offer were computed from.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct PricingSnapshot {
    /// Base price the totals started from.
    pub base: BaseSnapshot,

    /// Discount applied to the totals, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<DiscountSnapshot>,
}

/// Base price of an offer.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct BaseSnapshot {
    /// Label of the base position.
    pub label: Option<String>,

    /// Base price, if known.
    pub amount_eur: Option<Money>,
}

/// Discount applied to an offer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DiscountSnapshot {
    /// Applied [`discount_code::Code`].
    pub code: discount_code::Code,

    /// Discount in percents.
    pub percent: Percent,
}

#[cfg(test)]
mod spec {
    use common::Money;

    use super::{BaseSnapshot, InputSnapshot, PricingSnapshot};

    #[test]
    fn tolerates_sparse_documents() {
        let snapshot: InputSnapshot = serde_json::from_str(
            r#"{"pricing": {"base": {"label": "Gutachten"}}}"#,
        )
        .unwrap();

        assert_eq!(snapshot.pricing.base.label.as_deref(), Some("Gutachten"));
        assert_eq!(snapshot.calculation_contact(), None);
        assert!(snapshot.addons.is_empty());
    }

    #[test]
    fn omits_absent_discount() {
        let pricing = PricingSnapshot {
            base: BaseSnapshot {
                label: Some("Gutachten".into()),
                amount_eur: Some(Money::eur(1449)),
            },
            discount: None,
        };

        assert_eq!(
            serde_json::to_value(&pricing).unwrap(),
            serde_json::json!({
                "base": {"label": "Gutachten", "amount_eur": 1449},
            }),
        );
    }
}
