//! [`Command`] for creating or updating a pricing catalogue [`Entry`].
//!
//! [`Entry`]: pricing::Entry

use common::{
    operations::{Commit, Transact, Transacted, Update},
    Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{customer, pricing},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating or updating a pricing catalogue
/// [`pricing::Entry`].
#[derive(Clone, Debug)]
pub struct UpsertPricingEntry(pub pricing::Entry);

impl<Db, Ntf> Command<UpsertPricingEntry> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Update<pricing::Entry>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = pricing::Entry;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        UpsertPricingEntry(mut entry): UpsertPricingEntry,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        entry.label = customer::non_blank(Some(entry.label))
            .ok_or(E::EmptyLabel)
            .map_err(tracerr::wrap!())?;
        if let Some(price) = entry.price.filter(|p| *p < Money::ZERO) {
            return Err(tracerr::new!(E::NegativePrice(price)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Update(entry.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let cache = self.cache();
        cache.pricing.invalidate(&entry.key).await;
        cache.pricing_lists.clear().await;

        Ok(entry)
    }
}

/// Error of [`UpsertPricingEntry`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`pricing::Entry`] label is blank.
    #[display("`pricing::Entry` label is empty")]
    EmptyLabel,

    /// [`pricing::Entry`] price is negative.
    #[display("`pricing::Entry` price is negative: {_0}")]
    NegativePrice(#[error(not(source))] Money),
}

#[cfg(test)]
mod spec {
    use common::Money;

    use crate::{
        command::{
            spec::{reference, service},
            update_offer_package::spec::offer,
            UpdateOfferPackage,
        },
        domain::pricing,
        Command as _,
    };

    use super::{ExecutionError, UpsertPricingEntry};

    fn key(k: &str) -> pricing::Key {
        pricing::Key::new(k).unwrap()
    }

    #[tokio::test]
    async fn new_price_applies_to_next_selection() {
        let (svc, _, _) = service(reference());
        let offer = offer(&svc).await;
        let packages = svc
            .cached::<Vec<pricing::Entry>, _>(Some(pricing::Category::package()))
            .await
            .unwrap();
        assert_eq!(packages.len(), 2);

        let entry = svc
            .cached::<Option<pricing::Entry>, _>(key("online"))
            .await
            .unwrap()
            .unwrap();
        drop(
            svc.execute(UpsertPricingEntry(pricing::Entry {
                price: Some(Money::eur(80)),
                ..entry
            }))
            .await
            .unwrap(),
        );
        drop(
            svc.execute(UpsertPricingEntry(pricing::Entry {
                key: key("express"),
                label: "Express".into(),
                category: pricing::Category::package(),
                sort_order: 10,
                price: Some(Money::eur(150)),
            }))
            .await
            .unwrap(),
        );

        let updated = svc
            .execute(UpdateOfferPackage {
                view_token: offer.view_token,
                package_key: Some("online".into()),
            })
            .await
            .unwrap();
        assert_eq!(updated.totals.net, Some(Money::eur(1080)));

        let packages = svc
            .cached::<Vec<pricing::Entry>, _>(Some(pricing::Category::package()))
            .await
            .unwrap();
        assert_eq!(packages.len(), 3);
    }

    #[tokio::test]
    async fn rejects_invalid_entry() {
        let (svc, db, _) = service(reference());

        let err = svc
            .execute(UpsertPricingEntry(pricing::Entry {
                key: key("express"),
                label: "Express".into(),
                category: pricing::Category::package(),
                sort_order: 10,
                price: Some(Money::eur(-5)),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NegativePrice(_)));

        let err = svc
            .execute(UpsertPricingEntry(pricing::Entry {
                key: key("express"),
                label: String::new(),
                category: pricing::Category::package(),
                sort_order: 10,
                price: None,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::EmptyLabel));
        assert_eq!(db.snapshot().pricing.len(), 3);
    }
}
