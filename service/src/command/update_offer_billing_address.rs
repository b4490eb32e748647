//! [`Command`] for updating the billing address of an [`Offer`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        customer::{self, Billing, Email},
        offer, Customer, Offer,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for updating the [`Billing`] address of an [`Offer`].
///
/// The address is stored for the linked [`Customer`] and mirrored into the
/// [`Offer`]'s input snapshot.
#[derive(Clone, Debug)]
pub struct UpdateOfferBillingAddress {
    /// [`offer::ViewToken`] of the [`Offer`] to update.
    pub view_token: offer::ViewToken,

    /// New [`Billing`] address.
    pub billing: Billing,
}

impl<Db, Ntf> Command<UpdateOfferBillingAddress> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Offer>, offer::ViewToken>>,
            Ok = Option<Offer>,
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
        > + Database<
            Lock<By<Customer, Email>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Customer>, Email>>,
            Ok = Option<Customer>,
            Err = Traced<database::Error>,
        > + Database<Update<Customer>, Err = Traced<database::Error>>
        + Database<Update<Offer>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Offer;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateOfferBillingAddress,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateOfferBillingAddress {
            view_token,
            billing,
        } = cmd;
        let billing = billing.normalized();

        let offer = self
            .database()
            .execute(Select(By::<Option<Offer>, _>::new(view_token)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OfferNotExists)
            .map_err(tracerr::wrap!())?;

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

        let linked = match offer.customer_id {
            Some(id) => tx
                .execute(Select(By::<Option<Customer>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?,
            None => None,
        };
        let customer = match linked {
            Some(c) => Some(c),
            None => {
                let email = offer::contact::resolve(&offer.input_snapshot, None)
                    .email
                    .or_else(|| billing.email.as_deref().and_then(Email::new));
                match email {
                    Some(email) => {
                        // Avoid concurrent creation of the same `Customer`.
                        tx.execute(Lock(By::<Customer, _>::new(email.clone())))
                            .await
                            .map_err(tracerr::map_from_and_wrap!(=> E))
                            .map(drop)?;

                        Some(
                            tx.execute(Select(By::<Option<Customer>, _>::new(
                                email.clone(),
                            )))
                            .await
                            .map_err(tracerr::map_from_and_wrap!(=> E))?
                            .unwrap_or_else(|| Customer {
                                id: customer::Id::new(),
                                email,
                                name: None,
                                phone: None,
                                billing: Billing::default(),
                                created_at: DateTime::now().coerce(),
                                updated_at: DateTime::now().coerce(),
                            }),
                        )
                    }
                    None => None,
                }
            }
        };

        let now = DateTime::now();
        if let Some(mut customer) = customer {
            customer.billing = billing.clone();
            customer.updated_at = now.coerce();
            offer.customer_id = Some(customer.id);

            tx.execute(Update(customer))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        let input = &mut offer.input_snapshot;
        input.customer.billing_address = Some(billing.clone());
        if let Some(inputs) = &mut input.calculation_inputs {
            inputs.billing_address = Some(billing);
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

        Ok(offer)
    }
}

/// Error of [`UpdateOfferBillingAddress`] [`Command`] execution.
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
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            spec::{reference, service},
            update_offer_package::spec::{close, offer},
        },
        domain::{customer::Billing, offer::Status},
        Command as _,
    };

    use super::{ExecutionError, UpdateOfferBillingAddress};

    fn billing() -> Billing {
        Billing {
            name: Some(" Erika Muster ".into()),
            company: Some("  ".into()),
            street: Some(" Elbchaussee 7 ".into()),
            zip: Some("22 763".into()),
            city: Some("Hamburg".into()),
            ..Billing::default()
        }
    }

    #[tokio::test]
    async fn stores_normalized_address() {
        let (svc, db, _) = service(reference());
        let offer = offer(&svc).await;

        let updated = svc
            .execute(UpdateOfferBillingAddress {
                view_token: offer.view_token.clone(),
                billing: billing(),
            })
            .await
            .unwrap();

        let expected = Billing {
            name: Some("Erika Muster".into()),
            company: None,
            email: None,
            street: Some("Elbchaussee 7".into()),
            zip: Some("22763".into()),
            city: Some("Hamburg".into()),
            country: Some("DE".into()),
        };
        assert_eq!(
            updated.input_snapshot.customer.billing_address.as_ref(),
            Some(&expected),
        );
        assert_eq!(
            updated
                .input_snapshot
                .calculation_inputs
                .as_ref()
                .and_then(|i| i.billing_address.as_ref()),
            Some(&expected),
        );
        assert_eq!(updated.totals, offer.totals);

        let state = db.snapshot();
        let customer = &state.customers[&offer.customer_id.unwrap()];
        assert_eq!(customer.billing, expected);
        assert_eq!(state.offers[&offer.id], updated);
    }

    #[tokio::test]
    async fn refuses_confirmed_offer() {
        let (svc, db, _) = service(reference());
        let offer = offer(&svc).await;
        let (svc, db2, _) = service(close(&db, offer.id, Status::Accepted));

        let err = svc
            .execute(UpdateOfferBillingAddress {
                view_token: offer.view_token,
                billing: billing(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::OfferAlreadyConfirmed(_),
        ));
        let customer = &db2.snapshot().customers[&offer.customer_id.unwrap()];
        assert_eq!(customer.billing.city.as_deref(), Some("Berlin"));
    }
}
