//! [`Customer`] definitions.

use std::sync::LazyLock;

use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Contact and billing identity of a person requesting offers.
///
/// Identified by its [`Email`], so multiple offers requested with the same
/// [`Email`] share a single [`Customer`].
#[derive(Clone, Debug, PartialEq)]
pub struct Customer {
    /// ID of this [`Customer`].
    pub id: Id,

    /// [`Email`] of this [`Customer`].
    pub email: Email,

    /// Full name of this [`Customer`].
    pub name: Option<String>,

    /// Phone number of this [`Customer`].
    pub phone: Option<String>,

    /// [`Billing`] address of this [`Customer`].
    pub billing: Billing,

    /// [`DateTime`] when this [`Customer`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Customer`] was last modified.
    ///
    /// [`DateTime`]: common::DateTime
    pub updated_at: ModificationDateTime,
}

impl Customer {
    /// Merges the provided [`Contact`] and [`Billing`] into this
    /// [`Customer`], keeping the existing values for the missing ones.
    pub fn merge(&mut self, contact: &Contact, billing: Option<&Billing>) {
        if let Some(name) = non_blank(contact.name.clone()) {
            self.name = Some(name);
        }
        if let Some(phone) = non_blank(contact.phone.clone()) {
            self.phone = Some(phone);
        }
        if let Some(billing) = billing {
            self.billing.merge(billing);
        }
    }
}

/// ID of a [`Customer`].
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

/// Normalized email address of a [`Customer`].
#[derive(
    AsRef, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Creates a new [`Email`] if the given `address` is valid.
    ///
    /// The `address` is trimmed and lowercased, so [`Email`]s compare
    /// case-insensitively.
    #[must_use]
    pub fn new(address: impl AsRef<str>) -> Option<Self> {
        let address = address.as_ref().trim().to_lowercase();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Email`].
    fn check(address: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Email`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[^\s@]{1,64}@[^\s@]+\.[^\s@]{2,}$")
                .expect("valid regex")
        });

        let address = address.as_ref();
        address.len() <= 255 && REGEX.is_match(address)
    }
}

impl FromStr for Email {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Email`")
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Contact details of a requester.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Contact {
    /// Full name.
    pub name: Option<String>,

    /// [`Email`] address.
    pub email: Option<Email>,

    /// Phone number.
    pub phone: Option<String>,
}

/// Billing address of a [`Customer`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Billing {
    /// Name of the invoiced person.
    pub name: Option<String>,

    /// Name of the invoiced company.
    pub company: Option<String>,

    /// Email address invoices are sent to.
    pub email: Option<String>,

    /// Street with a house number.
    pub street: Option<String>,

    /// Postal code.
    pub zip: Option<String>,

    /// City.
    pub city: Option<String>,

    /// Country code.
    pub country: Option<String>,
}

impl Billing {
    /// Country assumed when none is provided.
    pub const DEFAULT_COUNTRY: &'static str = "DE";

    /// Normalizes this [`Billing`] address.
    ///
    /// Trims all the parts, strips whitespace from the postal code, drops the
    /// blank parts and defaults the country to [`Billing::DEFAULT_COUNTRY`].
    #[must_use]
    pub fn normalized(self) -> Self {
        let zip = self
            .zip
            .map(|z| z.chars().filter(|c| !c.is_whitespace()).collect());
        Self {
            name: non_blank(self.name),
            company: non_blank(self.company),
            email: non_blank(self.email).map(|e| e.to_lowercase()),
            street: non_blank(self.street),
            zip: non_blank(zip),
            city: non_blank(self.city),
            country: non_blank(self.country)
                .or_else(|| Some(Self::DEFAULT_COUNTRY.to_owned())),
        }
    }

    /// Indicates whether this [`Billing`] address is sufficient for
    /// invoicing.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.street, &self.zip, &self.city]
            .into_iter()
            .all(|part| part.as_deref().is_some_and(|p| !p.trim().is_empty()))
    }

    /// Overwrites parts of this [`Billing`] address with the present parts
    /// of the `other` one.
    pub fn merge(&mut self, other: &Self) {
        let parts = [
            (&mut self.name, &other.name),
            (&mut self.company, &other.company),
            (&mut self.email, &other.email),
            (&mut self.street, &other.street),
            (&mut self.zip, &other.zip),
            (&mut self.city, &other.city),
            (&mut self.country, &other.country),
        ];
        for (own, new) in parts {
            if new.is_some() {
                own.clone_from(new);
            }
        }
    }
}

/// Trims the provided `value`, treating a blank one as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// [`DateTime`] when a [`Customer`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Customer, unit::Creation)>;

/// [`DateTime`] when a [`Customer`] was last modified.
///
/// [`DateTime`]: common::DateTime
pub type ModificationDateTime = DateTimeOf<(Customer, unit::Modification)>;
