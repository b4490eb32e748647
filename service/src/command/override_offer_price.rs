//! [`Command`] for overriding the price of an [`Offer`].

use std::fmt;

use common::{
    operations::{
        By, Commit, Dispatch, Lock, Select, Transact, Transacted, Update,
    },
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use rust_decimal::Decimal;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        calculation, customer, offer, pricing, property_type, Calculation,
        Customer, Notification, Offer, PropertyType,
    },
    infra::{database, Database, Notifier},
    Service,
};

use super::Command;

/// [`Command`] for overriding the base price of an [`Offer`], bypassing the
/// price of its [`PropertyType`].
///
/// Applies to confirmed [`Offer`]s too.
#[derive(Clone, Debug)]
pub struct OverrideOfferPrice {
    /// ID of the [`Offer`] to re-price.
    pub offer_id: offer::Id,

    /// New base price, if any.
    ///
    /// [`None`] makes the [`Offer`] priced on request.
    pub price: Option<Decimal>,
}

impl<Db, Ntf> Command<OverrideOfferPrice> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Calculation>, calculation::Id>>,
            Ok = Option<Calculation>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<PropertyType>, property_type::Key>>,
            Ok = Option<PropertyType>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<pricing::Entry>, pricing::Key>>,
            Ok = Option<pricing::Entry>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Offer, offer::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Offer>, offer::Id>>,
            Ok = Option<Offer>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Customer>, customer::Id>>,
            Ok = Option<Customer>,
            Err = Traced<database::Error>,
        > + Database<Update<Offer>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<Dispatch<Notification>, Err: fmt::Display>,
{
    type Ok = Offer;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: OverrideOfferPrice,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let OverrideOfferPrice { offer_id, price } = cmd;

        let price = match price {
            Some(p) => Some(
                Money::round(p)
                    .filter(|m| *m >= Money::ZERO)
                    .ok_or(E::InvalidPrice(p))
                    .map_err(tracerr::wrap!())?,
            ),
            None => None,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent modifications of the same `Offer`.
        tx.execute(Lock(By::<Offer, _>::new(offer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut offer = tx
            .execute(Select(By::<Option<Offer>, _>::new(offer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OfferNotExists(offer_id))
            .map_err(tracerr::wrap!())?;

        let property_type = match offer.calculation_snapshot.property_type_key.clone() {
            Some(key) => self
                .cached::<Option<PropertyType>, _>(key)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?,
            None => None,
        };
        // Keep the frozen package if it's gone from the catalogue.
        if let Some(key) = offer.package.as_ref().map(|p| p.key.clone()) {
            if let Some(entry) = self
                .cached::<Option<pricing::Entry>, _>(key)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .filter(pricing::Entry::is_package)
            {
                offer.package = Some(entry.into());
            }
        }

        let customer = match offer.customer_id {
            Some(id) => tx
                .execute(Select(By::<Option<Customer>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?,
            None => None,
        };
        let contact =
            offer::contact::resolve(&offer.input_snapshot, customer.as_ref());

        let now = DateTime::now();
        offer.base_price = price;
        offer.price_on_request = price.is_none();
        offer.reprice(
            offer.base_label(property_type.as_ref()),
            self.config().vat_percent,
        );
        let notify = price.is_some() && contact.email.is_some();
        if notify && offer.status == offer::Status::Draft {
            offer.status = offer::Status::Sent;
            offer.sent_at = Some(now.coerce());
        }
        offer.updated_at = now.coerce();

        tx.execute(Update(offer.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        if let Some(recipient) = contact.email.filter(|_| notify) {
            // Best-effort past the `Commit`.
            match self
                .database()
                .execute(Select(By::<Option<Calculation>, _>::new(
                    offer.calculation_id,
                )))
                .await
            {
                Ok(Some(calculation)) => {
                    self.notify(Notification::CalculationResult {
                        recipient,
                        calculation: Box::new(calculation),
                        offer: Some(Box::new(offer.clone())),
                    })
                    .await;
                }
                Ok(None) => log::warn!(
                    offer = %offer.number,
                    "`Calculation` of `Offer` is gone, skipping notification",
                ),
                Err(e) => log::warn!(
                    offer = %offer.number,
                    "failed to load `Calculation` for notification: {e}",
                ),
            }
        }

        Ok(offer)
    }
}

/// Error of [`OverrideOfferPrice`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Provided price is negative or out of range.
    #[display("Invalid price: {_0}")]
    InvalidPrice(#[error(not(source))] Decimal),

    /// [`Offer`] with the provided ID does not exist.
    #[display("`Offer(id: {_0})` does not exist")]
    OfferNotExists(#[error(not(source))] offer::Id),
}

#[cfg(test)]
mod spec {
    use common::Money;
    use rust_decimal::Decimal;

    use crate::{
        command::{
            spec::{reference, service},
            update_offer_package::spec::{close, offer},
            UpdateOfferPackage,
        },
        domain::{
            offer::{self, Status},
            Notification,
        },
        Command as _,
    };

    use super::{ExecutionError, OverrideOfferPrice};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn reprices_and_sends_offer() {
        let (svc, db, ntf) = service(reference());
        let offer = offer(&svc).await;
        drop(
            svc.execute(UpdateOfferPackage {
                view_token: offer.view_token.clone(),
                package_key: Some("online".into()),
            })
            .await
            .unwrap(),
        );

        let updated = svc
            .execute(OverrideOfferPrice {
                offer_id: offer.id,
                price: Some(decimal("1499.50")),
            })
            .await
            .unwrap();

        assert_eq!(updated.base_price, Some(Money::eur(1500)));
        assert!(!updated.price_on_request);
        assert_eq!(updated.totals.net, Some(Money::eur(1550)));
        assert_eq!(updated.totals.vat, Some(Money::eur(295)));
        assert_eq!(updated.totals.gross, Some(Money::eur(1845)));
        assert_eq!(updated.status, Status::Sent);
        assert!(updated.sent_at.is_some());
        assert_eq!(
            updated.input_snapshot.pricing.base.amount_eur,
            Some(Money::eur(1500)),
        );
        assert_eq!(db.snapshot().offers[&offer.id], updated);

        let sent = ntf.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[1],
            Notification::CalculationResult { offer: Some(o), .. }
                if o.base_price == Some(Money::eur(1500))
        ));
    }

    #[tokio::test]
    async fn corrects_confirmed_offer() {
        let (svc, db, _) = service(reference());
        let offer = offer(&svc).await;
        let (svc, _, ntf) = service(close(&db, offer.id, Status::Accepted));

        let updated = svc
            .execute(OverrideOfferPrice {
                offer_id: offer.id,
                price: Some(decimal("800")),
            })
            .await
            .unwrap();

        assert_eq!(updated.status, Status::Accepted);
        assert_eq!(updated.totals.gross, Some(Money::eur(952)));
        assert_eq!(ntf.sent().len(), 1);
    }

    #[tokio::test]
    async fn clears_price() {
        let (svc, _, ntf) = service(reference());
        let offer = offer(&svc).await;

        let updated = svc
            .execute(OverrideOfferPrice {
                offer_id: offer.id,
                price: None,
            })
            .await
            .unwrap();

        assert!(updated.price_on_request);
        assert_eq!(updated.base_price, None);
        assert_eq!(updated.totals.net, None);
        assert_eq!(updated.status, Status::Draft);
        assert_eq!(ntf.sent().len(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let (svc, _, _) = service(reference());
        let offer = offer(&svc).await;

        let err = svc
            .execute(OverrideOfferPrice {
                offer_id: offer.id,
                price: Some(decimal("-1")),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::InvalidPrice(_)));

        let missing = offer::Id::new();
        let err = svc
            .execute(OverrideOfferPrice {
                offer_id: missing,
                price: Some(decimal("100")),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::OfferNotExists(id) if *id == missing,
        ));
    }

    #[tokio::test]
    async fn keeps_price_when_calculation_is_gone() {
        let (svc, db, _) = service(reference());
        let offer = offer(&svc).await;
        let mut state = db.snapshot();
        state.calculations.clear();
        let (svc, db, ntf) = service(state);

        let updated = svc
            .execute(OverrideOfferPrice {
                offer_id: offer.id,
                price: Some(decimal("1200")),
            })
            .await
            .unwrap();

        assert_eq!(updated.base_price, Some(Money::eur(1200)));
        assert_eq!(db.snapshot().offers[&offer.id], updated);
        assert!(ntf.sent().is_empty());
    }
}
