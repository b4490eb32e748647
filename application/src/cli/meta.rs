//! Reference data a calculation input is composed of.

use common::DateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use service::{
    domain::{calculation, pricing, renovation, PropertyType},
    infra::database,
    query::reference,
    Query,
};
use tracerr::Traced;

use crate::{AsError, Error};

/// Reference data a calculation input is composed of.
#[derive(Debug, Serialize)]
pub struct Output {
    /// Known property types, the ones priced on request going last.
    pub property_types: Vec<PropertyType>,

    /// Renovation categories along with their time factors.
    pub renovation_categories: Vec<renovation::Category>,

    /// Weights of renovation extents.
    pub extent_weights: Vec<ExtentWeight>,

    /// Keys of the renovation time windows.
    pub time_windows: Vec<&'static str>,

    /// Pricing catalogue.
    pub ga_pricings: Vec<pricing::Entry>,

    /// Default input values.
    pub defaults: Defaults,
}

/// Weight of a single renovation extent.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ExtentWeight {
    /// Extent in percents.
    pub extent_percent: u8,

    /// Weight multiplier.
    pub weight: Decimal,
}

/// Default input values.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Defaults {
    /// Current tax year.
    pub steuerjahr: calculation::Year,
}

/// Collects the reference data a calculation input is composed of.
///
/// # Errors
///
/// If the storage fails.
pub async fn execute<Svc>(svc: &Svc) -> Result<Output, Error>
where
    Svc: Query<
            reference::PropertyTypes,
            Ok = Vec<PropertyType>,
            Err = Traced<database::Error>,
        > + Query<
            reference::RenovationCategories,
            Ok = Vec<renovation::Category>,
            Err = Traced<database::Error>,
        > + Query<
            reference::ExtentWeights,
            Ok = renovation::ExtentWeights,
            Err = Traced<database::Error>,
        > + Query<
            reference::PricingEntries,
            Ok = Vec<pricing::Entry>,
            Err = Traced<database::Error>,
        >,
{
    let mut property_types = svc
        .execute(reference::PropertyTypes::by(()))
        .await
        .map_err(AsError::into_error)?;
    property_types.sort_by(|a, b| {
        (a.request_only, &a.label).cmp(&(b.request_only, &b.label))
    });

    let renovation_categories = svc
        .execute(reference::RenovationCategories::by(()))
        .await
        .map_err(AsError::into_error)?;
    let extent_weights = svc
        .execute(reference::ExtentWeights::by(()))
        .await
        .map_err(AsError::into_error)?
        .iter()
        .map(|(extent, weight)| ExtentWeight {
            extent_percent: extent.percent(),
            weight,
        })
        .collect();
    let ga_pricings = svc
        .execute(reference::PricingEntries::by(None))
        .await
        .map_err(AsError::into_error)?;

    Ok(Output {
        property_types,
        renovation_categories,
        extent_weights,
        time_windows: renovation::TimeWindow::ALL
            .iter()
            .map(|w| w.key())
            .collect(),
        ga_pricings,
        defaults: Defaults {
            steuerjahr: DateTime::now().year(),
        },
    })
}

#[cfg(test)]
mod spec {
    use crate::cli::spec::service;

    use super::execute;

    #[tokio::test]
    async fn lists_reference_data() {
        let (svc, _) = service();

        let meta = execute(&svc).await.unwrap();

        assert_eq!(meta.property_types.len(), 1);
        assert_eq!(meta.ga_pricings.len(), 1);
        assert!(meta.renovation_categories.is_empty());
        assert_eq!(
            meta.time_windows,
            [
                "nicht",
                "bis_5",
                "bis_10",
                "bis_15",
                "bis_20",
                "ueber_20",
                "weiss_nicht",
            ],
        );

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json["property_types"][0]["price_standard_eur"],
            serde_json::json!(1000),
        );
        assert_eq!(json["ga_pricings"][0]["key"], "besichtigung");
    }
}
