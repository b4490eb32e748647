//! [`Offer`] operations.

use common::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service::{
    command::{
        self, ApplyOfferDiscount, ConfirmOffer, CreateOffer, OverrideOfferPrice,
        UpdateOfferBillingAddress, UpdateOfferPackage,
    },
    domain::{
        customer::{Billing, Contact},
        offer, Offer,
    },
    infra::database,
    query, Command, Query,
};
use tracerr::Traced;

use crate::{
    cli::{calculate::CalculationError, OfferError},
    define_error, AsError, Error,
};

/// [`Offer`] along with the values derived for display.
#[derive(Debug, Serialize)]
pub struct OfferView {
    /// Current state of the [`Offer`].
    #[serde(flatten)]
    pub offer: Offer,

    /// Price of the on-site inspection, if selected.
    pub inspection_price_eur: Option<Money>,
}

impl From<Offer> for OfferView {
    fn from(offer: Offer) -> Self {
        Self {
            inspection_price_eur: offer.inspection_price(),
            offer,
        }
    }
}

/// JSON input of an [`Offer`] creation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateInput {
    /// Public reference of the calculation to make the [`Offer`] for.
    pub calculation_public_ref: String,

    /// Requesting customer.
    pub customer: CustomerInput,

    /// Billing address, overriding the address of the `customer`.
    pub billing_address: Option<Billing>,

    /// Key of the package to select.
    pub ga_package_key: Option<String>,

    /// Keys of the add-ons to select.
    pub addons: Vec<String>,

    /// Free-text notes.
    pub notes: Option<String>,
}

/// Customer part of a [`CreateInput`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomerInput {
    /// [`Contact`] details.
    #[serde(flatten)]
    pub contact: Contact,

    /// Street and house number.
    pub street: Option<String>,

    /// Postal code.
    pub zip: Option<String>,

    /// City.
    pub city: Option<String>,

    /// Country code.
    pub country: Option<String>,
}

impl From<CreateInput> for CreateOffer {
    fn from(input: CreateInput) -> Self {
        let CreateInput {
            calculation_public_ref,
            customer:
                CustomerInput {
                    contact,
                    street,
                    zip,
                    city,
                    country,
                },
            billing_address,
            ga_package_key,
            addons,
            notes,
        } = input;

        let address = [&street, &zip, &city, &country]
            .iter()
            .any(|f| f.is_some())
            .then(|| Billing {
                name: contact.name.clone(),
                email: contact.email.as_ref().map(ToString::to_string),
                street,
                zip,
                city,
                country,
                ..Billing::default()
            });

        Self {
            calculation_public_ref,
            customer: contact,
            billing_address: billing_address.or(address),
            package_key: ga_package_key,
            addons,
            notes,
        }
    }
}

/// JSON input of a billing address update.
#[derive(Clone, Debug, Deserialize)]
pub struct BillingInput {
    /// New billing address.
    pub billing_address: Billing,
}

/// Parses the provided `token` into an [`offer::ViewToken`].
fn view_token(token: &str) -> Result<offer::ViewToken, Error> {
    offer::ViewToken::new(token.trim()).ok_or_else(|| OfferError::NotExists.into())
}

/// Returns the [`Offer`] accessible by the provided view `token`.
///
/// # Errors
///
/// If no such [`Offer`] exists or the storage fails.
pub async fn show<Svc>(svc: &Svc, token: &str) -> Result<OfferView, Error>
where
    Svc: Query<
        query::offer::ByViewToken,
        Ok = Option<Offer>,
        Err = Traced<database::Error>,
    >,
{
    svc.execute(query::offer::ByViewToken::by(view_token(token)?))
        .await
        .map_err(AsError::into_error)?
        .map(Into::into)
        .ok_or_else(|| OfferError::NotExists.into())
}

/// Creates an [`Offer`] out of the provided [`CreateInput`], or updates the
/// existing one of the same calculation.
///
/// # Errors
///
/// If the [`CreateInput`] is invalid or the [`Offer`] cannot be modified.
pub async fn create<Svc>(
    svc: &Svc,
    input: CreateInput,
) -> Result<OfferView, Error>
where
    Svc: Command<
        CreateOffer,
        Ok = Offer,
        Err = Traced<command::create_offer::ExecutionError>,
    >,
{
    svc.execute(input.into())
        .await
        .map(Into::into)
        .map_err(AsError::into_error)
}

/// Selects the package with the provided `key`, or deselects the current one.
///
/// # Errors
///
/// If the package is not available or the [`Offer`] cannot be modified.
pub async fn package<Svc>(
    svc: &Svc,
    token: &str,
    key: Option<String>,
) -> Result<OfferView, Error>
where
    Svc: Command<
        UpdateOfferPackage,
        Ok = Offer,
        Err = Traced<command::update_offer_package::ExecutionError>,
    >,
{
    svc.execute(UpdateOfferPackage {
        view_token: view_token(token)?,
        package_key: key,
    })
    .await
    .map(Into::into)
    .map_err(AsError::into_error)
}

/// Applies the provided discount `code`, or removes the applied one.
///
/// # Errors
///
/// If the `code` is invalid or inactive, or the [`Offer`] cannot be modified.
pub async fn discount<Svc>(
    svc: &Svc,
    token: &str,
    code: Option<String>,
) -> Result<OfferView, Error>
where
    Svc: Command<
        ApplyOfferDiscount,
        Ok = Offer,
        Err = Traced<command::apply_offer_discount::ExecutionError>,
    >,
{
    svc.execute(ApplyOfferDiscount {
        view_token: view_token(token)?,
        code,
    })
    .await
    .map(Into::into)
    .map_err(AsError::into_error)
}

/// Replaces the billing address of the [`Offer`].
///
/// # Errors
///
/// If the [`Offer`] cannot be modified.
pub async fn billing<Svc>(
    svc: &Svc,
    token: &str,
    input: BillingInput,
) -> Result<OfferView, Error>
where
    Svc: Command<
        UpdateOfferBillingAddress,
        Ok = Offer,
        Err = Traced<command::update_offer_billing_address::ExecutionError>,
    >,
{
    svc.execute(UpdateOfferBillingAddress {
        view_token: view_token(token)?,
        billing: input.billing_address,
    })
    .await
    .map(Into::into)
    .map_err(AsError::into_error)
}

/// Confirms the [`Offer`].
///
/// # Errors
///
/// If the billing address is incomplete or the [`Offer`] is closed.
pub async fn confirm<Svc>(svc: &Svc, token: &str) -> Result<OfferView, Error>
where
    Svc: Command<
        ConfirmOffer,
        Ok = Offer,
        Err = Traced<command::confirm_offer::ExecutionError>,
    >,
{
    svc.execute(ConfirmOffer {
        view_token: view_token(token)?,
    })
    .await
    .map(Into::into)
    .map_err(AsError::into_error)
}

/// Overrides the base price of the [`Offer`] with the provided ID.
///
/// # Errors
///
/// If the `price` is negative or no such [`Offer`] exists.
pub async fn price<Svc>(
    svc: &Svc,
    id: &str,
    price: Option<Decimal>,
) -> Result<OfferView, Error>
where
    Svc: Command<
        OverrideOfferPrice,
        Ok = Offer,
        Err = Traced<command::override_offer_price::ExecutionError>,
    >,
{
    let offer_id = id
        .trim()
        .parse::<offer::Id>()
        .map_err(|_| Error::from(OfferError::NotExists))?;

    svc.execute(OverrideOfferPrice { offer_id, price })
        .await
        .map(Into::into)
        .map_err(AsError::into_error)
}

define_error! {
    enum OfferInputError {
        #[code = "DISCOUNT_CODE_INVALID"]
        #[kind = Validation]
        #[field = "code"]
        #[message = "Der eingegebene Rabattcode ist ungültig oder nicht \
                     mehr aktiv."]
        InvalidDiscountCode,

        #[code = "BILLING_INCOMPLETE"]
        #[kind = Validation]
        #[field = "billing_address"]
        #[message = "Bitte ergänzen Sie Ihre Rechnungsadresse, bevor Sie das \
                     Angebot bestätigen."]
        BillingIncomplete,

        #[code = "PRICE_INVALID"]
        #[kind = Validation]
        #[field = "price"]
        #[message = "Der Preis darf nicht negativ sein."]
        InvalidPrice,
    }
}

impl AsError for command::create_offer::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::CalculationNotExists(_) => {
                CalculationError::CalculationNotExists.into()
            }
            Self::OfferAlreadyConfirmed(_) => {
                OfferError::AlreadyConfirmed.into()
            }
            Self::OfferClosed(_) => OfferError::Closed.into(),
            Self::PackageNotAvailable(_) => {
                OfferError::PackageNotAvailable.into()
            }
        })
    }
}

impl AsError for command::update_offer_package::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::OfferAlreadyConfirmed(_) => {
                OfferError::AlreadyConfirmed.into()
            }
            Self::OfferClosed(_) => OfferError::Closed.into(),
            Self::OfferNotExists => OfferError::NotExists.into(),
            Self::PackageNotAvailable(_) => {
                OfferError::PackageNotAvailable.into()
            }
        })
    }
}

impl AsError for command::apply_offer_discount::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::InvalidDiscountCode(_) => {
                OfferInputError::InvalidDiscountCode.into()
            }
            Self::OfferAlreadyConfirmed(_) => {
                OfferError::AlreadyConfirmed.into()
            }
            Self::OfferClosed(_) => OfferError::Closed.into(),
            Self::OfferNotExists => OfferError::NotExists.into(),
        })
    }
}

impl AsError for command::update_offer_billing_address::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::OfferAlreadyConfirmed(_) => {
                OfferError::AlreadyConfirmed.into()
            }
            Self::OfferClosed(_) => OfferError::Closed.into(),
            Self::OfferNotExists => OfferError::NotExists.into(),
        })
    }
}

impl AsError for command::confirm_offer::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::BillingIncomplete => OfferInputError::BillingIncomplete.into(),
            Self::OfferClosed(_) => OfferError::Closed.into(),
            Self::OfferNotExists => OfferError::NotExists.into(),
        })
    }
}

impl AsError for command::override_offer_price::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::InvalidPrice(_) => OfferInputError::InvalidPrice.into(),
            Self::OfferNotExists(_) => OfferError::NotExists.into(),
        })
    }
}

#[cfg(test)]
mod spec {
    use common::Money;
    use rust_decimal::Decimal;
    use service::domain::{customer::Billing, offer::Status};

    use crate::{
        cli::{
            calculate,
            spec::{service, TestService},
        },
        error::Kind,
    };

    use super::{BillingInput, CreateInput, OfferView};

    async fn offer(svc: &TestService) -> OfferView {
        let input = serde_json::from_value(serde_json::json!({
            "property_type_key": "einfamilienhaus",
            "baujahr": 2000,
            "anschaffungsjahr": 2010,
            "steuerjahr": 2023,
            "contact": {"name": "Erika Muster", "email": "erika@example.com"},
        }))
        .unwrap();
        calculate::execute(svc, input).await.unwrap().offer.unwrap()
    }

    #[tokio::test]
    async fn walks_offer_to_confirmation() {
        let (svc, ntf) = service();
        let created = offer(&svc).await;
        let token = created.offer.view_token.to_string();

        let shown = super::show(&svc, &token).await.unwrap();
        assert_eq!(shown.offer, created.offer);

        let packaged =
            super::package(&svc, &token, Some("besichtigung".into()))
                .await
                .unwrap();
        assert_eq!(packaged.inspection_price_eur, Some(Money::eur(350)));
        assert_eq!(packaged.offer.totals.net, Some(Money::eur(1350)));

        let err = super::confirm(&svc, &token).await.unwrap_err();
        assert_eq!(err.code, "BILLING_INCOMPLETE");
        assert_eq!(err.field, Some("billing_address"));

        drop(
            super::billing(
                &svc,
                &token,
                BillingInput {
                    billing_address: Billing {
                        name: Some("Erika Muster".into()),
                        email: Some("erika@example.com".into()),
                        street: Some("Hauptstr. 1".into()),
                        zip: Some("10115".into()),
                        city: Some("Berlin".into()),
                        ..Billing::default()
                    },
                },
            )
            .await
            .unwrap(),
        );
        let confirmed = super::confirm(&svc, &token).await.unwrap();
        assert_eq!(confirmed.offer.status, Status::Accepted);
        assert_eq!(ntf.sent().len(), 2);

        let err = super::discount(&svc, &token, Some("SAVE10".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, Kind::StateConflict);
        assert_eq!(
            err.message,
            "Das Angebot wurde bereits bestätigt und kann nicht mehr \
             geändert werden.",
        );
    }

    #[tokio::test]
    async fn reports_invalid_requests() {
        let (svc, _) = service();
        let created = offer(&svc).await;
        let token = created.offer.view_token.to_string();

        let err = super::discount(&svc, &token, Some("SAVE10".into()))
            .await
            .unwrap_err();
        assert_eq!((err.kind, err.field), (Kind::Validation, Some("code")));

        let err = super::package(&svc, &token, Some("online".into()))
            .await
            .unwrap_err();
        assert_eq!(err.field, Some("ga_package_key"));

        let err = super::price(
            &svc,
            &created.offer.id.to_string(),
            Some(Decimal::NEGATIVE_ONE),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, "PRICE_INVALID");

        for err in [
            super::show(&svc, "unknown").await.unwrap_err(),
            super::confirm(&svc, &"a".repeat(64)).await.unwrap_err(),
            super::price(&svc, "not-an-id", None).await.unwrap_err(),
        ] {
            assert_eq!(err.kind, Kind::NotFound);
        }
    }

    #[tokio::test]
    async fn creates_offer_with_customer_address() {
        let (svc, _) = service();
        let created = offer(&svc).await;

        let input: CreateInput = serde_json::from_value(serde_json::json!({
            "calculation_public_ref":
                created.offer.calculation_snapshot.public_ref,
            "customer": {
                "email": "erika@example.com",
                "street": "Hauptstr. 1",
                "zip": "10115",
                "city": "Berlin",
            },
            "ga_package_key": "besichtigung",
        }))
        .unwrap();
        let updated = super::create(&svc, input).await.unwrap();

        assert_eq!(updated.offer.id, created.offer.id);
        assert_eq!(updated.inspection_price_eur, Some(Money::eur(350)));

        let err = super::create(
            &svc,
            CreateInput {
                calculation_public_ref: "missing".into(),
                ..CreateInput::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.field, Some("calculation_public_ref"));
    }
}
