//! [`Offer`] definitions.

pub mod contact;
pub mod pricing;
pub mod snapshot;

use std::{fmt, sync::LazyLock};

use common::{define_kind, unit, DateTimeOf, Money, Percent};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{calculation, customer, PropertyType};

pub use self::{
    pricing::{AppliedDiscount, LineItem, Package, Totals},
    snapshot::{CalculationSnapshot, InputSnapshot},
};

/// Priced quote for a remaining useful life assessment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Offer {
    /// ID of this [`Offer`].
    pub id: Id,

    /// Sequential [`Number`] of this [`Offer`].
    pub number: Number,

    /// ID of the [`Calculation`] this [`Offer`] is made for.
    ///
    /// [`Calculation`]: crate::domain::Calculation
    pub calculation_id: calculation::Id,

    /// ID of the [`Customer`] this [`Offer`] is made for.
    ///
    /// [`Customer`]: crate::domain::Customer
    pub customer_id: Option<customer::Id>,

    /// [`ViewToken`] granting access to this [`Offer`].
    pub view_token: ViewToken,

    /// [`Status`] of this [`Offer`].
    pub status: Status,

    /// Indicator whether this [`Offer`] is priced on request.
    pub price_on_request: bool,

    /// Base price of the assessment.
    pub base_price: Option<Money>,

    /// Selected [`Package`], if any.
    pub package: Option<Package>,

    /// [`AppliedDiscount`], if any.
    pub discount: Option<AppliedDiscount>,

    /// VAT rate the [`Totals`] were computed with.
    pub vat_percent: Percent,

    /// Priced [`LineItem`]s.
    pub line_items: Vec<LineItem>,

    /// [`Totals`] of the [`LineItem`]s.
    pub totals: Totals,

    /// [`CalculationSnapshot`] frozen at creation.
    pub calculation_snapshot: CalculationSnapshot,

    /// [`InputSnapshot`] refreshed on every mutation.
    pub input_snapshot: InputSnapshot,

    /// Free-text notes.
    pub notes: Option<String>,

    /// [`DateTime`] when this [`Offer`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Offer`] was last modified.
    ///
    /// [`DateTime`]: common::DateTime
    pub updated_at: ModificationDateTime,

    /// [`DateTime`] when this [`Offer`] was sent to the customer.
    ///
    /// [`DateTime`]: common::DateTime
    pub sent_at: Option<DispatchDateTime>,

    /// [`DateTime`] when this [`Offer`] was accepted.
    ///
    /// [`DateTime`]: common::DateTime
    pub accepted_at: Option<AcceptanceDateTime>,

    /// [`DateTime`] when this [`Offer`] was rejected.
    ///
    /// [`DateTime`]: common::DateTime
    pub rejected_at: Option<RejectionDateTime>,

    /// [`DateTime`] when this [`Offer`] expires.
    ///
    /// [`DateTime`]: common::DateTime
    pub expires_at: Option<ExpirationDateTime>,
}

impl Offer {
    /// Key of the package mirrored into [`Offer::inspection_price()`].
    pub const INSPECTION_PACKAGE: &'static str = "besichtigung";

    /// Indicates whether this [`Offer`] has been confirmed by the customer.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some() || self.status == Status::Accepted
    }

    /// Indicates whether the customer may still modify this [`Offer`].
    #[must_use]
    pub fn is_modifiable(&self) -> bool {
        !self.is_accepted() && matches!(self.status, Status::Draft | Status::Sent)
    }

    /// Returns the price of the on-site inspection package, if selected.
    #[must_use]
    pub fn inspection_price(&self) -> Option<Money> {
        self.package
            .as_ref()
            .filter(|p| p.key.as_ref() == Self::INSPECTION_PACKAGE)
            .and_then(|p| p.price)
    }

    /// Resolves the label of the base [`LineItem`].
    ///
    /// The label of the provided [`PropertyType`] wins over the frozen
    /// [`CalculationSnapshot`], which wins over the last [`InputSnapshot`].
    #[must_use]
    pub fn base_label(&self, property_type: Option<&PropertyType>) -> String {
        property_type
            .map(|pt| pt.label.clone())
            .or_else(|| self.calculation_snapshot.property_type_label.clone())
            .or_else(|| self.input_snapshot.pricing.base.label.clone())
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| pricing::DEFAULT_BASE_LABEL.to_owned())
    }

    /// Returns the label of the current base [`LineItem`], resolving it anew
    /// if there is none.
    #[must_use]
    pub fn current_base_label(&self) -> String {
        self.line_items
            .iter()
            .find(|i| i.is_base())
            .map_or_else(|| self.base_label(None), |i| i.label.clone())
    }

    /// Rebuilds the [`LineItem`]s of this [`Offer`] and recomputes its
    /// [`Totals`] with the provided VAT rate.
    ///
    /// The pricing basis is mirrored into the [`InputSnapshot`].
    pub fn reprice(&mut self, base_label: impl Into<String>, vat: Percent) {
        let base_label = base_label.into();

        self.line_items = Some(LineItem::base(&base_label, self.base_price))
            .into_iter()
            .chain(self.package.as_ref().map(LineItem::from))
            .collect();
        self.vat_percent = vat;
        self.totals = pricing::price(
            &self.line_items,
            vat,
            self.price_on_request,
            self.discount.as_ref().map_or(Percent::ZERO, |d| d.percent),
        );

        let input = &mut self.input_snapshot;
        input.addons = self.package.iter().map(|p| p.key.clone()).collect();
        input.pricing = snapshot::PricingSnapshot {
            base: snapshot::BaseSnapshot {
                label: Some(base_label),
                amount_eur: self.base_price,
            },
            discount: self.discount.as_ref().map(|d| {
                snapshot::DiscountSnapshot {
                    code: d.code.clone(),
                    percent: d.percent,
                }
            }),
        };
    }
}

/// ID of an [`Offer`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Sequential number of an [`Offer`] within a calendar year.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
pub struct Number {
    /// Calendar year the [`Offer`] was created in.
    year: calculation::Year,

    /// Sequence of the [`Offer`] within the `year`.
    seq: u32,
}

impl Number {
    /// Creates a new [`Number`] out of its parts.
    #[must_use]
    pub const fn new(year: calculation::Year, seq: u32) -> Self {
        Self { year, seq }
    }

    /// Returns the first [`Number`] of the provided `year`.
    #[must_use]
    pub const fn first(year: calculation::Year) -> Self {
        Self { year, seq: 1 }
    }

    /// Returns the [`Number`] following the provided `last` one of the
    /// `year`.
    #[must_use]
    pub fn next_after(last: Option<Self>, year: calculation::Year) -> Self {
        last.filter(|n| n.year == year)
            .map_or(Self::first(year), |n| Self {
                year,
                seq: n.seq.saturating_add(1),
            })
    }

    /// Returns the calendar year of this [`Number`].
    #[must_use]
    pub const fn year(self) -> calculation::Year {
        self.year
    }

    /// Returns the sequence of this [`Number`] within its year.
    #[must_use]
    pub const fn seq(self) -> u32 {
        self.seq
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AN-{:04}-{:04}", self.year, self.seq)
    }
}

impl FromStr for Number {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        /// Regular expression parsing [`Number`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^AN-(\d{4})-(\d+)$").expect("valid regex")
        });

        let caps = REGEX.captures(s).ok_or("invalid `offer::Number`")?;
        Ok(Self {
            year: caps[1].parse().map_err(|_| "invalid `offer::Number` year")?,
            seq: caps[2].parse().map_err(|_| "invalid `offer::Number` seq")?,
        })
    }
}

impl Serialize for Number {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Unguessable token granting customers access to an [`Offer`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct ViewToken(String);

impl ViewToken {
    /// Length of a [`ViewToken`].
    pub const LENGTH: usize = 64;

    /// Generates a new random [`ViewToken`].
    #[must_use]
    pub fn generate() -> Self {
        Self(crate::domain::random_token(Self::LENGTH))
    }

    /// Creates a new [`ViewToken`] if the given `token` is valid.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        Self::check(&token).then_some(Self(token))
    }

    /// Checks whether the given `token` is a valid [`ViewToken`].
    fn check(token: impl AsRef<str>) -> bool {
        let token = token.as_ref();
        token.len() == Self::LENGTH
            && token.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl FromStr for ViewToken {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `offer::ViewToken`")
    }
}

impl<'de> Deserialize<'de> for ViewToken {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

define_kind! {
    #[doc = "Status of an [`Offer`]."]
    enum Status {
        #[doc = "Created, but not sent to the customer yet."]
        #[key = "draft"]
        Draft = 1,

        #[doc = "Sent to the customer."]
        #[key = "sent"]
        Sent = 2,

        #[doc = "Confirmed by the customer."]
        #[key = "accepted"]
        Accepted = 3,

        #[doc = "Rejected by the customer."]
        #[key = "rejected"]
        Rejected = 4,

        #[doc = "Not confirmed in time."]
        #[key = "expired"]
        Expired = 5,
    }
}

/// [`DateTime`] when an [`Offer`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Offer, unit::Creation)>;

/// [`DateTime`] when an [`Offer`] was last modified.
///
/// [`DateTime`]: common::DateTime
pub type ModificationDateTime = DateTimeOf<(Offer, unit::Modification)>;

/// [`DateTime`] when an [`Offer`] was sent.
///
/// [`DateTime`]: common::DateTime
pub type DispatchDateTime = DateTimeOf<(Offer, unit::Dispatching)>;

/// [`DateTime`] when an [`Offer`] was accepted.
///
/// [`DateTime`]: common::DateTime
pub type AcceptanceDateTime = DateTimeOf<(Offer, unit::Acceptance)>;

/// [`DateTime`] when an [`Offer`] was rejected.
///
/// [`DateTime`]: common::DateTime
pub type RejectionDateTime = DateTimeOf<(Offer, unit::Rejection)>;

/// [`DateTime`] when an [`Offer`] expires.
///
/// [`DateTime`]: common::DateTime
pub type ExpirationDateTime = DateTimeOf<(Offer, unit::Expiration)>;

/// [`DateTime`] when a discount was applied to an [`Offer`].
///
/// [`DateTime`]: common::DateTime
pub type DiscountDateTime = DateTimeOf<(Offer, unit::Redemption)>;

#[cfg(test)]
pub(crate) mod spec {
    use common::{DateTime, Money, Percent};
    use rust_decimal::Decimal;

    use crate::domain::{calculation, discount_code, pricing};

    use super::{
        AppliedDiscount, CalculationSnapshot, Id, InputSnapshot, Number, Offer,
        Package, Status, Totals, ViewToken,
    };

    /// Creates a draft [`Offer`] with the provided base price.
    pub(crate) fn draft(base_price: Option<i64>) -> Offer {
        Offer {
            id: Id::new(),
            number: Number::first(2025),
            calculation_id: calculation::Id::new(),
            customer_id: None,
            view_token: ViewToken::generate(),
            status: Status::Draft,
            price_on_request: base_price.is_none(),
            base_price: base_price.map(Money::eur),
            package: None,
            discount: None,
            vat_percent: Percent::ZERO,
            line_items: vec![],
            totals: Totals::default(),
            calculation_snapshot: CalculationSnapshot::default(),
            input_snapshot: InputSnapshot::default(),
            notes: None,
            created_at: DateTime::now().coerce(),
            updated_at: DateTime::now().coerce(),
            sent_at: None,
            accepted_at: None,
            rejected_at: None,
            expires_at: None,
        }
    }

    fn vat() -> Percent {
        Percent::new(Decimal::from(19)).unwrap()
    }

    #[test]
    fn formats_number() {
        assert_eq!(Number::first(2025).to_string(), "AN-2025-0001");
        assert_eq!(
            "AN-2025-0042".parse::<Number>().unwrap(),
            Number { year: 2025, seq: 42 },
        );
        assert_eq!(
            Number { year: 2025, seq: 12345 }.to_string(),
            "AN-2025-12345",
        );
        assert!("AN-25-0001".parse::<Number>().is_err());
        assert!("RE-2025-0001".parse::<Number>().is_err());
    }

    #[test]
    fn continues_sequence_within_year() {
        let last = Number { year: 2025, seq: 41 };

        assert_eq!(Number::next_after(Some(last), 2025).seq(), 42);
        assert_eq!(Number::next_after(Some(last), 2026), Number::first(2026));
        assert_eq!(Number::next_after(None, 2025), Number::first(2025));
    }

    #[test]
    fn generates_view_token() {
        let token = ViewToken::generate();

        assert_eq!(token.to_string().len(), ViewToken::LENGTH);
        assert_ne!(token, ViewToken::generate());
        assert!(ViewToken::new("a".repeat(63)).is_none());
    }

    #[test]
    fn reprices_with_package_and_discount() {
        let mut offer = draft(Some(1000));
        offer.package = Some(Package {
            key: pricing::Key::new("besichtigung").unwrap(),
            label: "Vor-Ort-Besichtigung".into(),
            price: Some(Money::eur(350)),
        });
        offer.discount = Some(AppliedDiscount {
            code: discount_code::Code::new("SAVE10").unwrap(),
            percent: Percent::new(Decimal::from(10)).unwrap(),
            applied_at: DateTime::now().coerce(),
        });

        offer.reprice("Einfamilienhaus", vat());

        assert_eq!(offer.line_items.len(), 2);
        assert!(offer.line_items[0].is_base());
        assert_eq!(offer.line_items[1].key, "besichtigung");
        assert_eq!(offer.totals.discount, Money::eur(135));
        assert_eq!(offer.totals.net, Some(Money::eur(1215)));
        assert_eq!(offer.totals.vat, Some(Money::eur(231)));
        assert_eq!(offer.totals.gross, Some(Money::eur(1446)));
        assert_eq!(offer.inspection_price(), Some(Money::eur(350)));

        let pricing = &offer.input_snapshot.pricing;
        assert_eq!(pricing.base.label.as_deref(), Some("Einfamilienhaus"));
        assert_eq!(pricing.discount.as_ref().unwrap().code.to_string(), "SAVE10");
        assert_eq!(offer.input_snapshot.addons.len(), 1);
    }

    #[test]
    fn reprices_on_request() {
        let mut offer = draft(None);
        offer.reprice("Mehrfamilienhaus", vat());

        assert_eq!(offer.line_items.len(), 1);
        assert_eq!(offer.line_items[0].amount, None);
        assert_eq!(offer.totals, Totals::default());
    }

    #[test]
    fn resolves_base_label() {
        let mut offer = draft(Some(1000));
        assert_eq!(offer.base_label(None), "Gutachten");

        offer.input_snapshot.pricing.base.label = Some("Altes Label".into());
        assert_eq!(offer.base_label(None), "Altes Label");

        offer.calculation_snapshot.property_type_label =
            Some("Eigentumswohnung".into());
        assert_eq!(offer.base_label(None), "Eigentumswohnung");
    }

    #[test]
    fn locks_after_acceptance() {
        let mut offer = draft(Some(1000));
        assert!(offer.is_modifiable());

        offer.status = Status::Expired;
        assert!(!offer.is_modifiable());
        assert!(!offer.is_accepted());

        offer.status = Status::Sent;
        offer.accepted_at = Some(DateTime::now().coerce());
        assert!(offer.is_accepted());
        assert!(!offer.is_modifiable());
    }
}
