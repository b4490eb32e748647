//! [`Command`] for confirming an [`Offer`] by the customer.

use std::fmt;

use common::{
    operations::{
        By, Commit, Dispatch, Lock, Select, Transact, Transacted, Update,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        calculation::Recommendation, customer, offer, Customer, Notification,
        Offer,
    },
    infra::{database, Database, Notifier},
    Service,
};

use super::Command;

/// [`Command`] for confirming an [`Offer`] by the customer.
///
/// Confirming an already confirmed [`Offer`] returns it as is.
#[derive(Clone, Debug)]
pub struct ConfirmOffer {
    /// [`offer::ViewToken`] of the [`Offer`] to confirm.
    pub view_token: offer::ViewToken,
}

impl<Db, Ntf> Command<ConfirmOffer> for Service<Db, Ntf>
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
        > + Database<Update<Offer>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<Dispatch<Notification>, Err: fmt::Display>,
{
    type Ok = Offer;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: ConfirmOffer) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let offer = self
            .database()
            .execute(Select(By::<Option<Offer>, _>::new(cmd.view_token)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OfferNotExists)
            .map_err(tracerr::wrap!())?;
        if offer.is_accepted() {
            return Ok(offer);
        }

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
            return Ok(offer);
        }
        if !offer.is_modifiable() {
            return Err(tracerr::new!(E::OfferClosed(offer.number)));
        }

        let customer = match offer.customer_id {
            Some(id) => tx
                .execute(Select(By::<Option<Customer>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?,
            None => None,
        };

        let input = &offer.input_snapshot;
        let billing = customer
            .as_ref()
            .map(|c| &c.billing)
            .into_iter()
            .chain(input.customer.billing_address.as_ref())
            .chain(
                input
                    .calculation_inputs
                    .as_ref()
                    .and_then(|i| i.billing_address.as_ref()),
            )
            .find(|b| b.is_complete())
            .cloned()
            .ok_or(E::BillingIncomplete)
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        offer.status = offer::Status::Accepted;
        offer.accepted_at = Some(now.coerce());
        offer.sent_at = offer.sent_at.or_else(|| Some(now.coerce()));
        offer.updated_at = now.coerce();

        tx.execute(Update(offer.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let contact =
            offer::contact::resolve(&offer.input_snapshot, customer.as_ref());
        if let Some(recipient) = contact.email.clone() {
            self.notify(Notification::OfferConfirmed {
                recipient,
                offer: Box::new(offer.clone()),
                contact: contact.clone(),
            })
            .await;
        }
        let engaged = offer.calculation_snapshot.recommendation
            == Some(Recommendation::Engage);
        if let Some(admin) = self
            .config()
            .admin_notification_email
            .clone()
            .filter(|_| engaged)
        {
            self.notify(Notification::AdminNotification {
                recipient: admin,
                offer: Box::new(offer.clone()),
                contact,
                billing,
            })
            .await;
        }

        Ok(offer)
    }
}

/// Error of [`ConfirmOffer`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Billing address is not sufficient for invoicing.
    #[display("Billing address is incomplete")]
    BillingIncomplete,

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Offer`] is rejected or expired.
    #[display("`Offer(number: {_0})` is closed")]
    OfferClosed(#[error(not(source))] offer::Number),

    /// [`Offer`] with the provided view token does not exist.
    #[display("`Offer` does not exist")]
    OfferNotExists,
}
