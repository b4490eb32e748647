//! [`Command`] for selecting a package of an [`Offer`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{customer, offer, pricing, property_type, Offer, PropertyType},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for selecting a package of an [`Offer`], or deselecting it.
#[derive(Clone, Debug)]
pub struct UpdateOfferPackage {
    /// [`offer::ViewToken`] of the [`Offer`] to update.
    pub view_token: offer::ViewToken,

    /// Key of the package to select, if any.
    pub package_key: Option<String>,
}

impl<Db, Ntf> Command<UpdateOfferPackage> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Offer>, offer::ViewToken>>,
            Ok = Option<Offer>,
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
        > + Database<Update<Offer>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Offer;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateOfferPackage,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateOfferPackage {
            view_token,
            package_key,
        } = cmd;

        let offer = self
            .database()
            .execute(Select(By::<Option<Offer>, _>::new(view_token)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OfferNotExists)
            .map_err(tracerr::wrap!())?;

        let property_type = match offer.calculation_snapshot.property_type_key.clone() {
            Some(key) => self
                .cached::<Option<PropertyType>, _>(key)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?,
            None => None,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent modifications of the same `Offer`.
        tx.execute(Lock(By::<Offer, _>::new(offer.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut offer = tx
            .execute(Select(By::<Option<Offer>, _>::new(offer.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OfferNotExists)
            .map_err(tracerr::wrap!())?;
        if offer.is_accepted() {
            return Err(tracerr::new!(E::OfferAlreadyConfirmed(offer.number)));
        }
        if !offer.is_modifiable() {
            return Err(tracerr::new!(E::OfferClosed(offer.number)));
        }

        let package = match customer::non_blank(package_key) {
            Some(key) => Some(
                match pricing::Key::new(key.as_str()) {
                    Some(k) => self
                        .cached::<Option<pricing::Entry>, _>(k)
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))?,
                    None => None,
                }
                .filter(pricing::Entry::is_package)
                .map(offer::Package::from)
                .ok_or(E::PackageNotAvailable(key))
                .map_err(tracerr::wrap!())?,
            ),
            None => None,
        };

        offer.package = package;
        offer.updated_at = DateTime::now().coerce();
        offer.reprice(
            offer.base_label(property_type.as_ref()),
            self.config().vat_percent,
        );

        tx.execute(Update(offer.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(offer)
    }
}

/// Error of [`UpdateOfferPackage`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Offer`] is already confirmed by the customer.
    #[display("`Offer(number: {_0})` is already confirmed")]
    OfferAlreadyConfirmed(#[error(not(source))] offer::Number),

    /// [`Offer`] is rejected or expired.
    #[display("`Offer(number: {_0})` is closed")]
    OfferClosed(#[error(not(source))] offer::Number),

    /// [`Offer`] with the provided view token does not exist.
    #[display("`Offer` does not exist")]
    OfferNotExists,

    /// Package with the provided key is not available.
    #[display("Package `{_0}` is not available")]
    PackageNotAvailable(#[error(not(source))] String),
}

#[cfg(test)]
pub(crate) mod spec {
    use common::{DateTime, Money};

    use crate::{
        command::{
            calculate_rnd::spec::calibrated,
            spec::{reference, service, TestService},
            ApplyOfferDiscount,
        },
        domain::{
            offer::{self, Status},
            Offer,
        },
        infra::{database::memory::State, Memory},
        Command as _,
    };

    use super::{ExecutionError, UpdateOfferPackage};

    /// Creates a draft [`Offer`] of a `1000` EUR base price through a
    /// recommended calculation.
    pub(crate) async fn offer(svc: &TestService) -> Offer {
        svc.execute(calibrated()).await.unwrap().offer.unwrap()
    }

    /// Returns a copy of the [`State`] with the stored [`Offer`] marked with
    /// the provided [`Status`].
    pub(crate) fn close(db: &Memory, id: offer::Id, status: Status) -> State {
        let mut state = db.snapshot();
        let stored = state.offers.get_mut(&id).unwrap();
        stored.status = status;
        if status == Status::Accepted {
            stored.accepted_at = Some(DateTime::now().coerce());
        }
        state
    }

    #[tokio::test]
    async fn selects_and_deselects_package() {
        let (svc, _, _) = service(reference());
        let offer = offer(&svc).await;

        let updated = svc
            .execute(UpdateOfferPackage {
                view_token: offer.view_token.clone(),
                package_key: Some("besichtigung".into()),
            })
            .await
            .unwrap();
        assert_eq!(updated.line_items.len(), 2);
        assert!(updated.line_items[0].is_base());
        assert_eq!(updated.line_items[0].label, "Einfamilienhaus");
        assert_eq!(updated.totals.net, Some(Money::eur(1350)));
        assert_eq!(updated.input_snapshot.addons.len(), 1);

        let updated = svc
            .execute(UpdateOfferPackage {
                view_token: offer.view_token.clone(),
                package_key: Some(String::new()),
            })
            .await
            .unwrap();
        assert_eq!(updated.line_items.len(), 1);
        assert_eq!(updated.package, None);
        assert_eq!(updated.totals.net, Some(Money::eur(1000)));
        assert!(updated.input_snapshot.addons.is_empty());
    }

    #[tokio::test]
    async fn preserves_discount() {
        let (svc, _, _) = service(reference());
        let offer = offer(&svc).await;
        drop(
            svc.execute(ApplyOfferDiscount {
                view_token: offer.view_token.clone(),
                code: Some("save10".into()),
            })
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

        assert_eq!(updated.totals.discount, Money::eur(105));
        assert_eq!(updated.totals.net, Some(Money::eur(945)));
    }

    #[tokio::test]
    async fn refuses_locked_offer() {
        let (svc, db, _) = service(reference());
        let offer = offer(&svc).await;

        for (status, accepted) in [
            (Status::Accepted, true),
            (Status::Expired, false),
            (Status::Rejected, false),
        ] {
            let (svc, _, _) = service(close(&db, offer.id, status));

            let err = svc
                .execute(UpdateOfferPackage {
                    view_token: offer.view_token.clone(),
                    package_key: Some("online".into()),
                })
                .await
                .unwrap_err();

            if accepted {
                assert!(matches!(
                    err.as_ref(),
                    ExecutionError::OfferAlreadyConfirmed(_),
                ));
            } else {
                assert!(matches!(err.as_ref(), ExecutionError::OfferClosed(_)));
            }
        }
    }

    #[tokio::test]
    async fn rejects_unknown_offer_and_package() {
        let (svc, _, _) = service(reference());
        let offer = offer(&svc).await;

        let err = svc
            .execute(UpdateOfferPackage {
                view_token: offer::ViewToken::generate(),
                package_key: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::OfferNotExists));

        let err = svc
            .execute(UpdateOfferPackage {
                view_token: offer.view_token,
                package_key: Some("1_we".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::PackageNotAvailable(k) if k == "1_we",
        ));
    }

    #[tokio::test]
    async fn reports_lock_before_unavailable_package() {
        let (svc, db, _) = service(reference());
        let offer = offer(&svc).await;
        let (svc, _, _) = service(close(&db, offer.id, Status::Accepted));

        let err = svc
            .execute(UpdateOfferPackage {
                view_token: offer.view_token,
                package_key: Some("1_we".into()),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::OfferAlreadyConfirmed(_),
        ));
    }
}
