//! Resolution of an offer recipient's [`Contact`].

use crate::domain::{
    customer::{self, Contact},
    Customer,
};

use super::InputSnapshot;

/// Resolves the [`Contact`] of an offer recipient.
///
/// Every field is taken from the first source having it, in order:
/// 1. customer details entered for the offer;
/// 2. contact entered for the calculation;
/// 3. stored [`Customer`].
#[must_use]
pub fn resolve(snapshot: &InputSnapshot, customer: Option<&Customer>) -> Contact {
    let entered = &snapshot.customer;
    let calculated = snapshot.calculation_contact();

    let text = |own: &Option<String>,
                calc: fn(&Contact) -> &Option<String>,
                stored: fn(&Customer) -> &Option<String>| {
        customer::non_blank(own.clone())
            .or_else(|| calculated.and_then(|c| customer::non_blank(calc(c).clone())))
            .or_else(|| customer.and_then(|c| customer::non_blank(stored(c).clone())))
    };

    Contact {
        name: text(&entered.name, |c| &c.name, |c| &c.name),
        email: entered
            .email
            .clone()
            .or_else(|| calculated.and_then(|c| c.email.clone()))
            .or_else(|| customer.map(|c| c.email.clone())),
        phone: text(&entered.phone, |c| &c.phone, |c| &c.phone),
    }
}
