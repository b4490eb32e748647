//! Domain definitions.

pub mod calculation;
pub mod customer;
pub mod discount_code;
pub mod formula;
pub mod notification;
pub mod offer;
pub mod pricing;
pub mod property_type;
pub mod renovation;

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng as _};

pub use self::{
    calculation::Calculation, customer::Customer,
    discount_code::DiscountCode, formula::FormulaSet,
    notification::Notification, offer::Offer, property_type::PropertyType,
};

/// Generates a cryptographically unpredictable alphanumeric token of the
/// provided length.
pub(crate) fn random_token(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
