//! [`Totals`] of an [`Offer`] derived from its [`LineItem`]s.
//!
//! [`Offer`]: super::Offer

use common::{Money, Percent};
use serde::{Deserialize, Serialize};

use crate::domain::{discount_code, pricing};

/// Key of the [`LineItem`] carrying the base assessment price.
pub const BASE_KEY: &str = "base";

/// Label of the base [`LineItem`] when nothing better is known.
pub const DEFAULT_BASE_LABEL: &str = "Gutachten";

/// Single priced position of an offer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LineItem {
    /// Key of this [`LineItem`].
    pub key: String,

    /// Human-readable label of this [`LineItem`].
    pub label: String,

    /// Price of this [`LineItem`], if known.
    #[serde(rename = "amount_eur")]
    pub amount: Option<Money>,
}

impl LineItem {
    /// Creates the base [`LineItem`].
    #[must_use]
    pub fn base(label: impl Into<String>, amount: Option<Money>) -> Self {
        Self {
            key: BASE_KEY.to_owned(),
            label: label.into(),
            amount,
        }
    }

    /// Indicates whether this is the base [`LineItem`].
    #[must_use]
    pub fn is_base(&self) -> bool {
        self.key == BASE_KEY
    }
}

impl From<&Package> for LineItem {
    fn from(package: &Package) -> Self {
        Self {
            key: package.key.to_string(),
            label: package.label.clone(),
            amount: package.price,
        }
    }
}

/// Package selected for an offer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Package {
    /// Key of the package pricing [`Entry`].
    ///
    /// [`Entry`]: pricing::Entry
    pub key: pricing::Key,

    /// Label of the package.
    pub label: String,

    /// Price of the package, if it has a fixed one.
    pub price: Option<Money>,
}

impl From<pricing::Entry> for Package {
    fn from(entry: pricing::Entry) -> Self {
        Self {
            key: entry.key,
            label: entry.label,
            price: entry.price,
        }
    }
}

/// Discount applied to an offer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AppliedDiscount {
    /// Applied [`discount_code::Code`].
    pub code: discount_code::Code,

    /// Discount in percents.
    pub percent: Percent,

    /// [`DateTime`] when the discount was applied.
    ///
    /// [`DateTime`]: common::DateTime
    pub applied_at: super::DiscountDateTime,
}

/// Monetary totals of an offer.
///
/// Every amount except the `discount` is [`None`] when the offer is priced
/// on request.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Totals {
    /// Total after the discount, without VAT.
    pub net: Option<Money>,

    /// Subtracted discount amount.
    pub discount: Money,

    /// VAT amount.
    pub vat: Option<Money>,

    /// Total including VAT.
    pub gross: Option<Money>,
}

/// Prices the provided [`LineItem`]s.
///
/// The `discount` percent is taken off the sum of the known amounts, and the
/// `vat` percent is added on top of the result. Zero sum is treated as
/// priced on request.
#[must_use]
pub fn price(
    items: &[LineItem],
    vat: Percent,
    price_on_request: bool,
    discount: Percent,
) -> Totals {
    let subtotal = items
        .iter()
        .filter_map(|i| i.amount)
        .reduce(|a, b| a + b)
        .filter(|sum| *sum != Money::ZERO);
    let Some(subtotal) = subtotal.filter(|_| !price_on_request) else {
        return Totals::default();
    };

    let discount = subtotal.percent(discount).min(subtotal);
    let net = (subtotal - discount).max(Money::ZERO);
    let vat = net.percent(vat);

    Totals {
        net: Some(net),
        discount,
        vat: Some(vat),
        gross: Some(net + vat),
    }
}

#[cfg(test)]
mod spec {
    use common::{Money, Percent};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::{price, LineItem, Totals};

    fn percent(value: i64) -> Percent {
        Percent::new(Decimal::from(value)).unwrap()
    }

    fn items(amounts: &[Option<i64>]) -> Vec<LineItem> {
        amounts
            .iter()
            .enumerate()
            .map(|(n, amount)| LineItem {
                key: format!("item_{n}"),
                label: format!("Position {n}"),
                amount: amount.map(Money::eur),
            })
            .collect()
    }

    fn totals(net: i64, discount: i64, vat: i64, gross: i64) -> Totals {
        Totals {
            net: Some(Money::eur(net)),
            discount: Money::eur(discount),
            vat: Some(Money::eur(vat)),
            gross: Some(Money::eur(gross)),
        }
    }

    #[test]
    fn applies_discount_before_vat() {
        let base = items(&[Some(1000)]);

        assert_eq!(
            price(&base, percent(19), false, percent(10)),
            totals(900, 100, 171, 1071),
        );
        assert_eq!(
            price(&base, percent(19), false, Percent::ZERO),
            totals(1000, 0, 190, 1190),
        );
    }

    #[test]
    fn sums_known_amounts() {
        assert_eq!(
            price(
                &items(&[Some(1449), None, Some(350)]),
                percent(19),
                false,
                Percent::ZERO,
            ),
            totals(1799, 0, 342, 2141),
        );
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(
            price(&items(&[Some(1449)]), percent(19), false, Percent::ZERO),
            totals(1449, 0, 275, 1724),
        );
        assert_eq!(
            price(&items(&[Some(5)]), percent(19), false, percent(10)),
            totals(4, 1, 1, 5),
        );
    }

    #[test]
    fn price_on_request_suppresses_totals() {
        let expected = Totals {
            net: None,
            discount: Money::ZERO,
            vat: None,
            gross: None,
        };

        assert_eq!(
            price(&items(&[Some(1000)]), percent(19), true, percent(10)),
            expected,
        );
        assert_eq!(
            price(&items(&[None]), percent(19), false, Percent::ZERO),
            expected,
        );
        assert_eq!(
            price(&items(&[Some(0), Some(0)]), percent(19), false, percent(10)),
            expected,
        );
        assert_eq!(price(&[], percent(19), false, Percent::ZERO), expected);
    }

    #[test]
    fn full_discount_zeroes_net() {
        assert_eq!(
            price(&items(&[Some(1000)]), percent(19), false, Percent::HUNDRED),
            totals(0, 1000, 0, 0),
        );
    }

    proptest! {
        #[test]
        fn totals_stay_consistent(
            amounts in proptest::collection::vec(
                proptest::option::of(0_i64..=100_000),
                0..5,
            ),
            vat in 0_i64..=100,
            discount in 0_i64..=100,
            on_request: bool,
        ) {
            let items = items(&amounts);
            let once = price(&items, percent(vat), on_request, percent(discount));
            let twice = price(&items, percent(vat), on_request, percent(discount));
            prop_assert_eq!(once, twice);

            if let (Some(net), Some(vat), Some(gross)) =
                (once.net, once.vat, once.gross)
            {
                prop_assert!(net >= Money::ZERO);
                prop_assert_eq!(gross, net + vat);
            } else {
                prop_assert_eq!(once.discount, Money::ZERO);
            }
        }
    }
}
