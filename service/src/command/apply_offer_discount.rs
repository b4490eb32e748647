//! [`Command`] for applying a [`DiscountCode`] to an [`Offer`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{customer, discount_code, offer, DiscountCode, Offer},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for applying a [`DiscountCode`] to an [`Offer`].
///
/// A blank `code` removes the currently applied discount.
#[derive(Clone, Debug)]
pub struct ApplyOfferDiscount {
    /// [`offer::ViewToken`] of the [`Offer`] to apply the discount to.
    pub view_token: offer::ViewToken,

    /// Code of the [`DiscountCode`] to apply.
    pub code: Option<String>,
}

impl<Db, Ntf> Command<ApplyOfferDiscount> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Offer>, offer::ViewToken>>,
            Ok = Option<Offer>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<DiscountCode>, discount_code::Code>>,
            Ok = Option<DiscountCode>,
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
        cmd: ApplyOfferDiscount,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ApplyOfferDiscount { view_token, code } = cmd;

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

        let discount = match customer::non_blank(code) {
            Some(code) => Some(
                match discount_code::Code::new(&code) {
                    Some(c) => self
                        .cached::<Option<DiscountCode>, _>(c)
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))?,
                    None => None,
                }
                .filter(|dc| dc.is_active)
                .ok_or(E::InvalidDiscountCode(code))
                .map_err(tracerr::wrap!())?,
            ),
            None => None,
        };

        let now = DateTime::now();
        offer.discount = discount.map(|dc| offer::AppliedDiscount {
            code: dc.code,
            percent: dc.percent,
            applied_at: now.coerce(),
        });
        offer.updated_at = now.coerce();
        // Keep the VAT rate the `Offer` was priced with.
        offer.reprice(offer.current_base_label(), offer.vat_percent);

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

/// Error of [`ApplyOfferDiscount`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`DiscountCode`] is unknown or inactive.
    #[display("`DiscountCode({_0})` is invalid or inactive")]
    InvalidDiscountCode(#[error(not(source))] String),

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
