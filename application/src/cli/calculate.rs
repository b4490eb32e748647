//! [`CalculateRnd`] operation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service::{
    command::{calculate_rnd, CalculateRnd},
    domain::{
        calculation::{self, estimate::InvalidSubject, Address},
        customer::{Billing, Contact},
        renovation, Calculation,
    },
    Command,
};
use tracerr::Traced;

use crate::{cli::offer::OfferView, define_error, AsError, Error};

/// JSON input of a calculation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Input {
    /// Key of the property type.
    pub property_type_key: Option<String>,

    /// Total useful life overriding the one of the property type.
    pub gnd_override: Option<i32>,

    /// Construction year.
    pub baujahr: Option<calculation::Year>,

    /// Acquisition year.
    pub anschaffungsjahr: Option<calculation::Year>,

    /// Tax year.
    pub steuerjahr: Option<calculation::Year>,

    /// Construction style.
    pub bauweise: Option<String>,

    /// Indicator whether the property is occupied by its owner.
    pub eigennutzung: Option<bool>,

    /// Renovation history.
    pub renovations: Vec<Renovation>,

    /// Address of the property.
    pub address: Option<Address>,

    /// Contact of the requester.
    pub contact: Contact,

    /// Billing address of the requester.
    pub billing_address: Option<Billing>,

    /// Free-text notes.
    pub notes: Option<String>,
}

/// Renovation history of a single category.
#[derive(Clone, Debug, Deserialize)]
pub struct Renovation {
    /// Key of the renovation category.
    pub category_key: renovation::Key,

    /// Recency and extent of the renovation.
    #[serde(flatten)]
    pub input: renovation::Input,
}

impl From<Input> for CalculateRnd {
    fn from(input: Input) -> Self {
        let Input {
            property_type_key,
            gnd_override,
            baujahr,
            anschaffungsjahr,
            steuerjahr,
            bauweise,
            eigennutzung,
            renovations,
            address,
            contact,
            billing_address,
            notes,
        } = input;

        Self {
            property_type_key,
            gnd_override,
            construction_year: baujahr,
            acquisition_year: anschaffungsjahr,
            tax_year: steuerjahr,
            construction_style: bauweise,
            owner_occupied: eigennutzung,
            // Later entries of the same category win.
            renovations: renovations
                .into_iter()
                .map(|r| (r.category_key, r.input))
                .collect(),
            address,
            contact,
            billing_address,
            notes,
        }
    }
}

/// [`Calculation`] along with the values derived for display.
#[derive(Debug, Serialize)]
pub struct CalculationView {
    /// Persisted [`Calculation`].
    #[serde(flatten)]
    pub calculation: Calculation,

    /// Human-readable remaining useful life interval.
    pub rnd_interval_label: Option<String>,

    /// Lower depreciation rate bound.
    pub afa_percent_from: Option<Decimal>,

    /// Upper depreciation rate bound.
    pub afa_percent_to: Option<Decimal>,

    /// Human-readable depreciation rate range.
    pub afa_percent_label: Option<String>,

    /// Recommendation shown to customers.
    pub recommendation_message: Option<&'static str>,
}

impl From<Calculation> for CalculationView {
    fn from(calculation: Calculation) -> Self {
        Self {
            rnd_interval_label: calculation.interval_label(),
            afa_percent_from: calculation.afa_percent_from(),
            afa_percent_to: calculation.afa_percent_to(),
            afa_percent_label: calculation.afa_percent_label(),
            recommendation_message: calculation
                .recommendation
                .map(calculation::Recommendation::message),
            calculation,
        }
    }
}

/// Output of a calculation.
#[derive(Debug, Serialize)]
pub struct Output {
    /// Performed calculation.
    pub calculation: CalculationView,

    /// Offer created for the calculation, if an assessment is recommended.
    pub offer: Option<OfferView>,
}

/// Calculates a remaining useful life out of the provided [`Input`].
///
/// # Errors
///
/// If the [`Input`] is invalid or the calculation fails.
pub async fn execute<Svc>(svc: &Svc, input: Input) -> Result<Output, Error>
where
    Svc: Command<
        CalculateRnd,
        Ok = calculate_rnd::Output,
        Err = Traced<calculate_rnd::ExecutionError>,
    >,
{
    let calculate_rnd::Output { calculation, offer } = svc
        .execute(input.into())
        .await
        .map_err(AsError::into_error)?;

    Ok(Output {
        calculation: calculation.into(),
        offer: offer.map(Into::into),
    })
}

define_error! {
    enum CalculationError {
        #[code = "PROPERTY_TYPE_NOT_EXISTS"]
        #[kind = Validation]
        #[field = "property_type_key"]
        #[message = "Die gewählte Immobilienart existiert nicht."]
        PropertyTypeNotExists,

        #[code = "GND_REQUIRED"]
        #[kind = Validation]
        #[field = "gnd_override"]
        #[message = "Für die ausgewählte Immobilienart muss eine \
                     Gesamtnutzungsdauer hinterlegt sein."]
        Gnd,

        #[code = "CONSTRUCTION_YEAR_REQUIRED"]
        #[kind = Validation]
        #[field = "baujahr"]
        #[message = "Das Baujahr ist erforderlich."]
        ConstructionYear,

        #[code = "ACQUISITION_YEAR_REQUIRED"]
        #[kind = Validation]
        #[field = "anschaffungsjahr"]
        #[message = "Das Anschaffungsjahr ist erforderlich."]
        AcquisitionYear,

        #[code = "TAX_YEAR_REQUIRED"]
        #[kind = Validation]
        #[field = "steuerjahr"]
        #[message = "Das Steuerjahr ist erforderlich."]
        TaxYear,

        #[code = "CALCULATION_NOT_EXISTS"]
        #[kind = Validation]
        #[field = "calculation_public_ref"]
        #[message = "Die angegebene Berechnung wurde nicht gefunden."]
        CalculationNotExists,
    }
}

impl AsError for InvalidSubject {
    fn try_as_error(&self) -> Option<Error> {
        Some(
            match self {
                Self::Gnd => CalculationError::Gnd,
                Self::ConstructionYear => CalculationError::ConstructionYear,
                Self::AcquisitionYear => CalculationError::AcquisitionYear,
                Self::TaxYear => CalculationError::TaxYear,
            }
            .into(),
        )
    }
}

impl AsError for calculate_rnd::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::InvalidSubject(e) => e.try_as_error(),
            Self::Offer(e) => e.try_as_error(),
            Self::PropertyTypeNotExists(_) => {
                Some(CalculationError::PropertyTypeNotExists.into())
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use service::domain::calculation::Recommendation;

    use crate::{cli::spec::service, error::Kind};

    use super::{execute, Input};

    fn input(json: serde_json::Value) -> Input {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn calculates_and_offers() {
        let (svc, ntf) = service();

        let out = execute(
            &svc,
            input(serde_json::json!({
                "property_type_key": "einfamilienhaus",
                "baujahr": 2000,
                "anschaffungsjahr": 2010,
                "steuerjahr": 2023,
                "renovations": [{
                    "category_key": "heizung",
                    "time_window_key": "bis_5",
                    "extent_percent": 60,
                }],
                "contact": {"email": "erika@example.com"},
            })),
        )
        .await
        .unwrap();

        // No formulas are configured, so the straight line applies.
        assert_eq!(out.calculation.calculation.rnd_years, 57.into());
        assert_eq!(
            out.calculation.calculation.recommendation,
            Some(Recommendation::Engage),
        );
        assert_eq!(
            out.calculation.rnd_interval_label.as_deref(),
            Some("rd. 55 – 60 Jahre"),
        );
        assert_eq!(
            out.calculation.afa_percent_label.as_deref(),
            Some("rd. 1,67 – 1,82 %"),
        );
        assert!(out.offer.is_some());
        assert_eq!(ntf.sent().len(), 1);

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["calculation"]["inputs"]["baujahr"], 2000);
        assert_eq!(
            json["calculation"]["recommendation_message"],
            "Gutachten ist sinnvoll, Beauftragung empfehlen",
        );
    }

    #[tokio::test]
    async fn reports_field_errors() {
        let (svc, _) = service();

        for (json, field) in [
            (serde_json::json!({"property_type_key": "villa"}), "property_type_key"),
            (
                serde_json::json!({"property_type_key": "einfamilienhaus"}),
                "baujahr",
            ),
            (
                serde_json::json!({
                    "property_type_key": "einfamilienhaus",
                    "baujahr": 2000,
                    "anschaffungsjahr": 2010,
                }),
                "steuerjahr",
            ),
        ] {
            let err = execute(&svc, input(json)).await.unwrap_err();
            assert_eq!(err.kind, Kind::Validation);
            assert_eq!(err.field, Some(field));
            assert!(err.backtrace.is_some());
        }
    }
}
