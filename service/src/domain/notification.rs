//! [`Notification`] definitions.

use crate::domain::{
    customer::{Billing, Contact, Email},
    Calculation, Offer,
};

/// Message delivered to a customer or an administrator.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// Result of a [`Calculation`], with the [`Offer`] made for it.
    CalculationResult {
        /// [`Email`] to deliver to.
        recipient: Email,

        /// Delivered [`Calculation`].
        calculation: Box<Calculation>,

        /// [`Offer`] made for the [`Calculation`], if any.
        offer: Option<Box<Offer>>,
    },

    /// Confirmation of an accepted [`Offer`].
    OfferConfirmed {
        /// [`Email`] to deliver to.
        recipient: Email,

        /// Accepted [`Offer`].
        offer: Box<Offer>,

        /// Resolved [`Contact`] of the customer.
        contact: Contact,
    },

    /// Administrator notice about an accepted [`Offer`].
    AdminNotification {
        /// [`Email`] to deliver to.
        recipient: Email,

        /// Accepted [`Offer`].
        offer: Box<Offer>,

        /// Resolved [`Contact`] of the customer.
        contact: Contact,

        /// [`Billing`] address of the customer.
        billing: Billing,
    },
}

impl Notification {
    /// Returns the [`Email`] this [`Notification`] is delivered to.
    #[must_use]
    pub fn recipient(&self) -> &Email {
        match self {
            Self::CalculationResult { recipient, .. }
            | Self::OfferConfirmed { recipient, .. }
            | Self::AdminNotification { recipient, .. } => recipient,
        }
    }

    /// Returns the short name of this [`Notification`] kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CalculationResult { .. } => "calculation_result",
            Self::OfferConfirmed { .. } => "offer_confirmed",
            Self::AdminNotification { .. } => "admin_notification",
        }
    }
}
