//! [`Command`] definition.

pub mod apply_offer_discount;
pub mod calculate_rnd;
pub mod confirm_offer;
pub mod create_offer;
pub mod delete_discount_code;
pub mod override_offer_price;
pub mod update_offer_billing_address;
pub mod update_offer_package;
pub mod upsert_discount_code;
pub mod upsert_formula_set;
pub mod upsert_pricing_entry;
pub mod upsert_property_type;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    apply_offer_discount::ApplyOfferDiscount, calculate_rnd::CalculateRnd,
    confirm_offer::ConfirmOffer, create_offer::CreateOffer,
    delete_discount_code::DeleteDiscountCode,
    override_offer_price::OverrideOfferPrice,
    update_offer_billing_address::UpdateOfferBillingAddress,
    update_offer_package::UpdateOfferPackage,
    upsert_discount_code::UpsertDiscountCode,
    upsert_formula_set::UpsertFormulaSet,
    upsert_pricing_entry::UpsertPricingEntry,
    upsert_property_type::UpsertPropertyType,
};
