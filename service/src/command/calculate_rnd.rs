//! [`Command`] for calculating a remaining useful life.

use std::fmt;

use common::{
    operations::{By, Commit, Dispatch, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use rust_decimal::{Decimal, RoundingStrategy};
use tracerr::Traced;

use crate::{
    domain::{
        calculation::{
            self,
            estimate::{InvalidSubject, Subject},
            score, Address, Recommendation, Score, Trace,
        },
        customer::{self, Billing, Contact},
        property_type, renovation, Calculation, FormulaSet, Notification,
        Offer, PropertyType,
    },
    infra::{database, Database, Notifier},
    Service,
};

use super::{create_offer, Command, CreateOffer};

/// [`Command`] for calculating a remaining useful life.
///
/// Creates an [`Offer`] for the persisted [`Calculation`] whenever an
/// assessment is recommended.
#[derive(Clone, Debug, Default)]
pub struct CalculateRnd {
    /// Key of the [`PropertyType`] to calculate for.
    pub property_type_key: Option<String>,

    /// Total useful life overriding the one of the [`PropertyType`].
    pub gnd_override: Option<i32>,

    /// Construction year of the property.
    pub construction_year: Option<calculation::Year>,

    /// Year the property was acquired in.
    pub acquisition_year: Option<calculation::Year>,

    /// Tax year the calculation is made for.
    pub tax_year: Option<calculation::Year>,

    /// Construction style of the property.
    pub construction_style: Option<String>,

    /// Indicator whether the property is occupied by its owner.
    pub owner_occupied: Option<bool>,

    /// Renovation history of the property.
    pub renovations: renovation::Inputs,

    /// [`Address`] of the property.
    pub address: Option<Address>,

    /// [`Contact`] of the requester.
    pub contact: Contact,

    /// [`Billing`] address of the requester.
    pub billing_address: Option<Billing>,

    /// Free-text notes.
    pub notes: Option<String>,
}

/// Result of [`CalculateRnd`] [`Command`] execution.
#[derive(Clone, Debug, PartialEq)]
pub struct Output {
    /// Persisted [`Calculation`].
    pub calculation: Calculation,

    /// [`Offer`] created for the [`Calculation`], if recommended.
    pub offer: Option<Offer>,
}

impl<Db, Ntf> Command<CalculateRnd> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<PropertyType>, property_type::Key>>,
            Ok = Option<PropertyType>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<renovation::Category>, ()>>,
            Ok = Vec<renovation::Category>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<renovation::ExtentWeights, ()>>,
            Ok = renovation::ExtentWeights,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<FormulaSet>, Score>>,
            Ok = Option<FormulaSet>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<Insert<Calculation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<Dispatch<Notification>, Err: fmt::Display>,
    Self: Command<
        CreateOffer,
        Ok = Offer,
        Err = Traced<create_offer::ExecutionError>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CalculateRnd) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CalculateRnd {
            property_type_key,
            gnd_override,
            construction_year,
            acquisition_year,
            tax_year,
            construction_style,
            owner_occupied,
            renovations,
            address,
            contact,
            billing_address,
            notes,
        } = cmd;

        let property_type = match property_type_key
            .clone()
            .and_then(property_type::Key::new)
        {
            Some(key) => self
                .cached::<Option<PropertyType>, _>(key)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?,
            None => None,
        }
        .ok_or_else(|| {
            E::PropertyTypeNotExists(property_type_key.unwrap_or_default())
        })
        .map_err(tracerr::wrap!())?;

        let subject = Subject {
            gnd_override,
            construction_year,
            acquisition_year,
            tax_year,
        }
        .resolve(&property_type)
        .map_err(tracerr::from_and_wrap!(=> E))?;

        let categories = self
            .cached::<Vec<renovation::Category>, _>(())
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let weights = self
            .cached::<renovation::ExtentWeights, _>(())
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let scoring = score::score(&categories, &weights, &renovations);

        let formula = self
            .cached::<Option<FormulaSet>, _>(scoring.score)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let estimate = subject.estimate(scoring.score, formula.as_ref());

        let round4 = |v: Decimal| {
            v.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
        };
        let contact = Contact {
            name: customer::non_blank(contact.name),
            email: contact.email,
            phone: customer::non_blank(contact.phone),
        };
        let calculation = Calculation {
            id: calculation::Id::new(),
            public_ref: calculation::PublicRef::generate(),
            property_type_key: property_type.key.clone(),
            gnd: estimate.gnd,
            construction_year: subject.construction_year,
            acquisition_year: subject.acquisition_year,
            tax_year: subject.tax_year,
            determination_year: estimate.determination_year,
            age: estimate.age,
            score: scoring.score,
            score_details: scoring.details,
            inputs: calculation::Inputs {
                property_type_key: Some(property_type.key),
                gnd_override,
                construction_year: subject.construction_year,
                acquisition_year: subject.acquisition_year,
                tax_year: subject.tax_year,
                determination_year: estimate.determination_year,
                construction_style: customer::non_blank(construction_style),
                owner_occupied,
                renovations,
                address: address.map(Address::normalized),
                contact,
                billing_address: billing_address.map(Billing::normalized),
                notes: customer::non_blank(notes),
            },
            trace: Trace {
                score_raw: round4(scoring.raw),
                score_rounded: scoring.score,
                relative_age: round4(estimate.relative_age),
                capped_determination_year: estimate.capped_determination_year,
                age_original: estimate.age_original,
                age: estimate.age,
                afa_percent_from: estimate.afa_percent_from,
                afa_percent_to: estimate.afa_percent_to,
                afa_percent: estimate.afa_percent,
                use_advanced_formula: estimate.use_advanced_formula,
                formula,
            },
            rnd_years: estimate.rnd_years,
            interval: Some(estimate.interval),
            afa_percent: estimate.afa_percent,
            recommendation: estimate.recommendation,
            created_at: DateTime::now().coerce(),
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Insert(calculation.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        if calculation.recommendation != Some(Recommendation::Engage) {
            return Ok(Output {
                calculation,
                offer: None,
            });
        }

        let inputs = &calculation.inputs;
        let offer = self
            .execute(CreateOffer {
                calculation_public_ref: calculation.public_ref.to_string(),
                customer: inputs.contact.clone(),
                billing_address: inputs.billing_address.clone(),
                package_key: None,
                addons: vec![],
                notes: inputs.notes.clone(),
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        if let Some(recipient) = inputs.contact.email.clone() {
            self.notify(Notification::CalculationResult {
                recipient,
                calculation: Box::new(calculation.clone()),
                offer: Some(Box::new(offer.clone())),
            })
            .await;
        }

        Ok(Output {
            calculation,
            offer: Some(offer),
        })
    }
}

/// Error of [`CalculateRnd`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Calculation input is invalid.
    #[display("Invalid calculation input: {_0}")]
    #[from]
    InvalidSubject(InvalidSubject),

    /// [`Offer`] creation failed.
    #[display("`Offer` creation failed: {_0}")]
    #[from]
    Offer(create_offer::ExecutionError),

    /// [`PropertyType`] with the provided key does not exist.
    #[display("`PropertyType(key: {_0})` does not exist")]
    PropertyTypeNotExists(#[error(not(source))] String),
}

#[cfg(test)]
pub(crate) mod spec {
    use common::{
        operations::{By, Select},
        Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::spec::{reference, service},
        domain::{
            calculation::{
                estimate::InvalidSubject, score::spec::inputs, Interval,
                Recommendation, Score,
            },
            customer::{Billing, Contact, Email},
            offer::Status,
            renovation::TimeWindow,
            Calculation, Notification,
        },
        infra::Database as _,
        Command as _,
    };

    use super::{CalculateRnd, ExecutionError};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    /// Calibration scenario of an old but thoroughly renovated house.
    pub(crate) fn calibrated() -> CalculateRnd {
        use TimeWindow as W;

        CalculateRnd {
            property_type_key: Some("einfamilienhaus".into()),
            construction_year: Some(1800),
            acquisition_year: Some(2022),
            tax_year: Some(2023),
            renovations: inputs(&[
                ("baeder_wc", W::UpTo5Years, 60),
                ("innenausbau", W::UpTo5Years, 100),
                ("fenster_tueren", W::UpTo5Years, 80),
                ("heizung", W::UpTo10Years, 60),
                ("leitungen", W::UpTo10Years, 20),
                ("dach_waermeschutz", W::Unknown, 0),
                ("aussenwaende", W::Never, 0),
            ]),
            contact: Contact {
                name: Some("  Erika Muster ".into()),
                email: Email::new("Erika@Example.com"),
                phone: None,
            },
            billing_address: Some(Billing {
                street: Some("Hauptstr. 1".into()),
                zip: Some("10 115".into()),
                city: Some("Berlin".into()),
                ..Billing::default()
            }),
            ..CalculateRnd::default()
        }
    }

    #[tokio::test]
    async fn calculates_calibration_scenario() {
        let (svc, db, ntf) = service(reference());

        let out = svc.execute(calibrated()).await.unwrap();
        let calc = &out.calculation;

        assert_eq!(calc.trace.score_raw, decimal("6.4"));
        assert_eq!(calc.score, Score::new(decimal("6.5")).unwrap());
        assert!(calc.trace.use_advanced_formula);
        assert_eq!(calc.trace.age_original, 223);
        assert_eq!(calc.age, 75);
        assert_eq!(calc.rnd_years, decimal("28.75"));
        assert_eq!(calc.interval, Some(Interval { min: 25, max: 30 }));
        assert_eq!(calc.afa_percent_from(), Some(decimal("3.33")));
        assert_eq!(calc.afa_percent_to(), Some(decimal("4.00")));
        assert_eq!(calc.interval_label().unwrap(), "rd. 25 – 30 Jahre");
        assert_eq!(calc.recommendation, Some(Recommendation::Engage));
        assert_eq!(calc.inputs.contact.name.as_deref(), Some("Erika Muster"));
        assert_eq!(
            calc.inputs.billing_address.as_ref().unwrap().zip.as_deref(),
            Some("10115"),
        );

        let stored = db
            .execute(Select(By::<Option<Calculation>, _>::new(
                calc.public_ref.clone(),
            )))
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), Some(calc));

        let offer = out.offer.unwrap();
        assert_eq!(offer.calculation_id, calc.id);
        assert_eq!(offer.status, Status::Draft);
        assert!(offer.customer_id.is_some());

        let sent = ntf.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            Notification::CalculationResult { recipient, offer: Some(_), .. }
                if recipient.to_string() == "erika@example.com"
        ));
    }

    #[tokio::test]
    async fn skips_offer_when_not_recommended() {
        let (svc, db, ntf) = service(reference());

        let out = svc
            .execute(CalculateRnd {
                property_type_key: Some("einfamilienhaus".into()),
                construction_year: Some(1960),
                acquisition_year: Some(2020),
                tax_year: Some(2024),
                renovations: Default::default(),
                ..calibrated()
            })
            .await
            .unwrap();

        assert!(out.calculation.rnd_years < Decimal::from(25));
        assert_eq!(
            out.calculation.recommendation,
            Some(Recommendation::Decline),
        );
        assert!(out.offer.is_none());
        assert!(ntf.sent().is_empty());
        assert!(db.snapshot().offers.is_empty());
    }

    #[tokio::test]
    async fn offers_on_request_when_type_has_no_price() {
        let (svc, db, ntf) = service(reference());

        let out = svc
            .execute(CalculateRnd {
                property_type_key: Some("mehrfamilienhaus".into()),
                ..calibrated()
            })
            .await
            .unwrap();

        assert_eq!(out.calculation.recommendation, Some(Recommendation::Engage));
        let offer = out.offer.unwrap();
        assert!(offer.price_on_request);
        assert_eq!(offer.base_price, None);
        assert_eq!(offer.totals.net, None);
        assert_eq!(offer.totals.vat, None);
        assert_eq!(offer.totals.gross, None);
        assert_eq!(offer.totals.discount, Money::ZERO);
        let base = offer.line_items.iter().find(|i| i.is_base()).unwrap();
        assert_eq!(base.amount, None);
        assert_eq!(db.snapshot().offers[&offer.id], offer);

        let sent = ntf.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            Notification::CalculationResult { offer: Some(o), .. }
                if o.price_on_request
        ));
    }

    #[tokio::test]
    async fn survives_notification_failure() {
        let (svc, db, ntf) = service(reference());
        ntf.set_failing(true);

        let out = svc.execute(calibrated()).await.unwrap();

        assert!(out.offer.is_some());
        assert_eq!(db.snapshot().offers.len(), 1);
        assert!(ntf.sent().is_empty());
    }

    #[tokio::test]
    async fn validates_in_order() {
        let (svc, _, _) = service(reference());

        let err = svc
            .execute(CalculateRnd {
                property_type_key: Some("unbekannt".into()),
                construction_year: None,
                ..calibrated()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::PropertyTypeNotExists(key) if key == "unbekannt",
        ));

        let err = svc
            .execute(CalculateRnd {
                property_type_key: Some("sonderobjekt".into()),
                construction_year: None,
                ..calibrated()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::InvalidSubject(InvalidSubject::Gnd),
        ));

        let err = svc
            .execute(CalculateRnd {
                gnd_override: Some(60),
                property_type_key: Some("sonderobjekt".into()),
                construction_year: Some(0),
                tax_year: None,
                ..calibrated()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::InvalidSubject(InvalidSubject::ConstructionYear),
        ));

        let err = svc
            .execute(CalculateRnd {
                acquisition_year: Some(-1),
                tax_year: None,
                ..calibrated()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::InvalidSubject(InvalidSubject::AcquisitionYear),
        ));

        let err = svc
            .execute(CalculateRnd {
                tax_year: None,
                ..calibrated()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::InvalidSubject(InvalidSubject::TaxYear),
        ));
    }
}
