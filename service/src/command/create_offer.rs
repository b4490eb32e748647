//! [`Command`] for creating an [`Offer`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        calculation,
        customer::{self, Billing, Contact},
        offer::{self, snapshot::CustomerSnapshot, CalculationSnapshot},
        pricing, property_type, Calculation, Customer, Offer, PropertyType,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating an [`Offer`] for a [`Calculation`].
///
/// Re-submitting it for the same [`Calculation`] updates the existing
/// [`Offer`] in place.
#[derive(Clone, Debug, Default)]
pub struct CreateOffer {
    /// [`calculation::PublicRef`] of the [`Calculation`] to make the
    /// [`Offer`] for.
    pub calculation_public_ref: String,

    /// [`Contact`] of the requester.
    pub customer: Contact,

    /// [`Billing`] address of the requester.
    pub billing_address: Option<Billing>,

    /// Key of the package to select.
    pub package_key: Option<String>,

    /// Keys of the add-ons to select, the first one being used when no
    /// `package_key` is provided.
    pub addons: Vec<String>,

    /// Free-text notes.
    pub notes: Option<String>,
}

impl<Db, Ntf> Command<CreateOffer> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Calculation>, calculation::PublicRef>>,
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
            Lock<By<Offer, calculation::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Offer>, calculation::Id>>,
            Ok = Option<Offer>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Customer, customer::Email>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Customer>, customer::Email>>,
            Ok = Option<Customer>,
            Err = Traced<database::Error>,
        > + Database<Update<Customer>, Err = Traced<database::Error>>
        + Database<
            Lock<By<offer::Number, calculation::Year>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<offer::Number>, calculation::Year>>,
            Ok = Option<offer::Number>,
            Err = Traced<database::Error>,
        > + Database<Update<Offer>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Offer;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateOffer) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateOffer {
            calculation_public_ref,
            customer: contact,
            billing_address,
            package_key,
            addons,
            notes,
        } = cmd;

        let calculation = match calculation::PublicRef::new(
            calculation_public_ref.trim(),
        ) {
            Some(public_ref) => self
                .database()
                .execute(Select(By::<Option<Calculation>, _>::new(public_ref)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?,
            None => None,
        }
        .ok_or(E::CalculationNotExists(calculation_public_ref))
        .map_err(tracerr::wrap!())?;

        let property_type = self
            .cached::<Option<PropertyType>, _>(
                calculation.property_type_key.clone(),
            )
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let contact = Contact {
            name: customer::non_blank(contact.name),
            email: contact.email,
            phone: customer::non_blank(contact.phone),
        };
        let billing = billing_address.map(Billing::normalized);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid duplicated offers for the same `Calculation`.
        tx.execute(Lock(By::<Offer, _>::new(calculation.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let existing = tx
            .execute(Select(By::<Option<Offer>, _>::new(calculation.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(o) = &existing {
            if o.is_accepted() {
                return Err(tracerr::new!(E::OfferAlreadyConfirmed(o.number)));
            }
            if !o.is_modifiable() {
                return Err(tracerr::new!(E::OfferClosed(o.number)));
            }
        }

        // Explicit package wins over the add-ons list.
        let package_key = customer::non_blank(package_key).or_else(|| {
            addons
                .into_iter()
                .find_map(|a| customer::non_blank(Some(a)))
        });
        let package = match package_key {
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

        let customer = if let Some(email) = contact.email.clone() {
            // Avoid concurrent creation of the same `Customer`.
            tx.execute(Lock(By::<Customer, _>::new(email.clone())))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let mut customer = tx
                .execute(Select(By::<Option<Customer>, _>::new(email.clone())))
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
                });

            // Fall back to the billing address entered for the calculation.
            let mut merged = calculation
                .inputs
                .billing_address
                .clone()
                .unwrap_or_default();
            if let Some(b) = &billing {
                merged.merge(b);
            }
            customer.merge(&contact, Some(&merged.normalized()));
            customer.updated_at = DateTime::now().coerce();

            tx.execute(Update(customer.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            Some(customer)
        } else {
            None
        };

        let now = DateTime::now();
        let mut offer = if let Some(o) = existing {
            o
        } else {
            let year = now.year();

            // Avoid assigning the same number twice.
            tx.execute(Lock(By::<offer::Number, _>::new(year)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let last = tx
                .execute(Select(By::<Option<offer::Number>, _>::new(year)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;

            Offer {
                id: offer::Id::new(),
                number: offer::Number::next_after(last, year),
                calculation_id: calculation.id,
                customer_id: None,
                view_token: offer::ViewToken::generate(),
                status: offer::Status::Draft,
                price_on_request: true,
                base_price: None,
                package: None,
                discount: None,
                vat_percent: self.config().vat_percent,
                line_items: vec![],
                totals: offer::Totals::default(),
                calculation_snapshot: CalculationSnapshot::default(),
                input_snapshot: offer::InputSnapshot::default(),
                notes: None,
                created_at: now.coerce(),
                updated_at: now.coerce(),
                sent_at: None,
                accepted_at: None,
                rejected_at: None,
                expires_at: Some(
                    (now + self.config().offer_validity).coerce(),
                ),
            }
        };

        let label = property_type.as_ref().map(|pt| pt.label.clone());
        offer.customer_id = customer.as_ref().map(|c| c.id).or(offer.customer_id);
        offer.base_price = property_type.as_ref().and_then(|pt| pt.price_standard);
        offer.price_on_request = offer.base_price.is_none();
        offer.package = package;
        offer.discount = None;
        offer.calculation_snapshot = CalculationSnapshot::new(&calculation, label);
        offer.input_snapshot = offer::InputSnapshot {
            calculation_inputs: Some(calculation.inputs.clone()),
            customer: CustomerSnapshot::new(&contact, billing),
            ..offer::InputSnapshot::default()
        };
        offer.notes = customer::non_blank(notes);
        offer.updated_at = now.coerce();
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

/// Error of [`CreateOffer`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Calculation`] with the provided public reference does not exist.
    #[display("`Calculation(public_ref: {_0})` does not exist")]
    CalculationNotExists(#[error(not(source))] String),

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

    /// Package with the provided key is not available.
    #[display("Package `{_0}` is not available")]
    PackageNotAvailable(#[error(not(source))] String),
}
