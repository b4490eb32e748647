//! Reference data administration operations.

use rust_decimal::Decimal;
use serde::Deserialize;
use service::{
    command::{
        self, DeleteDiscountCode, UpsertDiscountCode, UpsertFormulaSet,
        UpsertPricingEntry, UpsertPropertyType,
    },
    domain::{pricing, DiscountCode, FormulaSet, PropertyType},
    Command,
};
use tracerr::Traced;

use crate::{define_error, AsError, Error};

/// JSON input of a discount code.
#[derive(Clone, Debug, Deserialize)]
pub struct DiscountCodeInput {
    /// Code customers enter.
    pub code: String,

    /// Human-readable label.
    #[serde(default)]
    pub label: Option<String>,

    /// Discount in percents.
    pub percent: Decimal,

    /// Indicator whether the code may be applied.
    #[serde(default = "active")]
    pub is_active: bool,
}

/// Default of [`DiscountCodeInput::is_active`].
const fn active() -> bool {
    true
}

impl From<DiscountCodeInput> for UpsertDiscountCode {
    fn from(input: DiscountCodeInput) -> Self {
        let DiscountCodeInput {
            code,
            label,
            percent,
            is_active,
        } = input;
        Self {
            code,
            label,
            percent,
            is_active,
        }
    }
}

/// Creates or updates the provided [`PropertyType`].
///
/// # Errors
///
/// If the [`PropertyType`] is invalid or the storage fails.
pub async fn property_type<Svc>(
    svc: &Svc,
    property_type: PropertyType,
) -> Result<PropertyType, Error>
where
    Svc: Command<
        UpsertPropertyType,
        Ok = PropertyType,
        Err = Traced<command::upsert_property_type::ExecutionError>,
    >,
{
    svc.execute(UpsertPropertyType(property_type))
        .await
        .map_err(AsError::into_error)
}

/// Creates or updates the provided [`pricing::Entry`].
///
/// # Errors
///
/// If the [`pricing::Entry`] is invalid or the storage fails.
pub async fn pricing<Svc>(
    svc: &Svc,
    mut entry: pricing::Entry,
) -> Result<pricing::Entry, Error>
where
    Svc: Command<
        UpsertPricingEntry,
        Ok = pricing::Entry,
        Err = Traced<command::upsert_pricing_entry::ExecutionError>,
    >,
{
    entry.category = pricing::Category::new(&entry.category);

    svc.execute(UpsertPricingEntry(entry))
        .await
        .map_err(AsError::into_error)
}

/// Creates or updates the provided [`FormulaSet`].
///
/// # Errors
///
/// If the storage fails.
pub async fn formula<Svc>(
    svc: &Svc,
    formula: FormulaSet,
) -> Result<FormulaSet, Error>
where
    Svc: Command<
        UpsertFormulaSet,
        Ok = FormulaSet,
        Err = Traced<command::upsert_formula_set::ExecutionError>,
    >,
{
    svc.execute(UpsertFormulaSet(formula))
        .await
        .map_err(AsError::into_error)
}

/// Creates or updates a [`DiscountCode`] out of the provided
/// [`DiscountCodeInput`].
///
/// # Errors
///
/// If the [`DiscountCodeInput`] is invalid or the storage fails.
pub async fn discount_code<Svc>(
    svc: &Svc,
    input: DiscountCodeInput,
) -> Result<DiscountCode, Error>
where
    Svc: Command<
        UpsertDiscountCode,
        Ok = DiscountCode,
        Err = Traced<command::upsert_discount_code::ExecutionError>,
    >,
{
    svc.execute(input.into())
        .await
        .map_err(AsError::into_error)
}

/// Deletes the [`DiscountCode`] with the provided `code`.
///
/// # Errors
///
/// If no such [`DiscountCode`] exists or the storage fails.
pub async fn delete_discount_code<Svc>(
    svc: &Svc,
    code: String,
) -> Result<DiscountCode, Error>
where
    Svc: Command<
        DeleteDiscountCode,
        Ok = DiscountCode,
        Err = Traced<command::delete_discount_code::ExecutionError>,
    >,
{
    svc.execute(DeleteDiscountCode { code })
        .await
        .map_err(AsError::into_error)
}

define_error! {
    enum AdminError {
        #[code = "LABEL_EMPTY"]
        #[kind = Validation]
        #[field = "label"]
        #[message = "Die Bezeichnung darf nicht leer sein."]
        EmptyLabel,

        #[code = "PRICE_NEGATIVE"]
        #[kind = Validation]
        #[field = "price_eur"]
        #[message = "Der Preis darf nicht negativ sein."]
        NegativePrice,

        #[code = "DISCOUNT_CODE_FORMAT_INVALID"]
        #[kind = Validation]
        #[field = "code"]
        #[message = "Der Rabattcode darf nur Buchstaben, Ziffern, \
                     Bindestriche und Unterstriche enthalten."]
        InvalidCode,

        #[code = "DISCOUNT_PERCENT_INVALID"]
        #[kind = Validation]
        #[field = "percent"]
        #[message = "Der Rabatt muss zwischen 1 und 100 Prozent liegen."]
        InvalidPercent,

        #[code = "DISCOUNT_CODE_NOT_EXISTS"]
        #[kind = NotFound]
        #[field = "code"]
        #[message = "Der Rabattcode wurde nicht gefunden."]
        DiscountCodeNotExists,
    }
}

impl AsError for command::upsert_property_type::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::EmptyLabel => Some(AdminError::EmptyLabel.into()),
        }
    }
}

impl AsError for command::upsert_pricing_entry::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::EmptyLabel => Some(AdminError::EmptyLabel.into()),
            Self::NegativePrice(_) => Some(AdminError::NegativePrice.into()),
        }
    }
}

impl AsError for command::upsert_formula_set::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::upsert_discount_code::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::InvalidCode(_) => Some(AdminError::InvalidCode.into()),
            Self::InvalidPercent(_) => Some(AdminError::InvalidPercent.into()),
        }
    }
}

impl AsError for command::delete_discount_code::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::DiscountCodeNotExists(_) => {
                Some(AdminError::DiscountCodeNotExists.into())
            }
        }
    }
}
