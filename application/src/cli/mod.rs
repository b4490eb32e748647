//! Command-line operations over the [`Service`].
//!
//! Every operation reads its structured input as JSON and produces a
//! [`Serialize`]able output, so the binary only has to print it.
//!
//! [`Service`]: service::Service

pub mod admin;
pub mod calculate;
pub mod meta;
pub mod offer;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{self, AsyncReadExt as _, AsyncWriteExt as _};

use crate::{define_error, AsError, Error};

/// Path of an input designating STDIN.
pub const STDIN: &str = "-";

define_error! {
    enum OfferError {
        #[code = "OFFER_NOT_EXISTS"]
        #[kind = NotFound]
        #[message = "Das Angebot wurde nicht gefunden."]
        NotExists,

        #[code = "OFFER_CONFIRMED"]
        #[kind = StateConflict]
        #[message = "Das Angebot wurde bereits bestätigt und kann nicht \
                     mehr geändert werden."]
        AlreadyConfirmed,

        #[code = "OFFER_CLOSED"]
        #[kind = StateConflict]
        #[message = "Das Angebot ist abgelaufen oder wurde abgelehnt und \
                     kann nicht mehr geändert werden."]
        Closed,

        #[code = "PACKAGE_NOT_AVAILABLE"]
        #[kind = Validation]
        #[field = "ga_package_key"]
        #[message = "Die ausgewählte Zusatzoption ist nicht verfügbar."]
        PackageNotAvailable,
    }
}

define_error! {
    enum InputError {
        #[code = "MALFORMED_INPUT"]
        #[kind = Validation]
        #[message = "Die Eingabe ist kein gültiges JSON-Dokument."]
        Malformed,
    }
}

/// Reads and deserializes a JSON input from the provided `path`, or from
/// STDIN if the `path` is [`STDIN`].
///
/// # Errors
///
/// If the input cannot be read or is not a valid JSON of the `T` shape.
pub async fn read_input<T: DeserializeOwned>(path: &str) -> Result<T, Error> {
    let raw = if path == STDIN {
        let mut raw = Vec::new();
        _ = io::stdin()
            .read_to_end(&mut raw)
            .await
            .map_err(AsError::into_error)?;
        raw
    } else {
        tokio::fs::read(path).await.map_err(AsError::into_error)?
    };
    parse_input(&raw)
}

/// Deserializes a JSON input of the `T` shape.
///
/// # Errors
///
/// If the `raw` input is not a valid JSON of the `T` shape.
pub fn parse_input<T: DeserializeOwned>(raw: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(raw).map_err(|e| {
        if e.is_syntax() || e.is_eof() {
            InputError::Malformed.into()
        } else {
            e.into_error()
        }
    })
}

/// Prints the provided `output` as pretty JSON to STDOUT.
///
/// # Errors
///
/// If the `output` cannot be serialized or written.
pub async fn print(output: &impl Serialize) -> Result<(), Error> {
    let mut json =
        serde_json::to_vec_pretty(output).map_err(|e| Error::internal(&e))?;
    json.push(b'\n');

    let mut stdout = io::stdout();
    stdout
        .write_all(&json)
        .await
        .map_err(|e| Error::internal(&e))?;
    stdout.flush().await.map_err(|e| Error::internal(&e))
}

#[cfg(test)]
pub(crate) mod spec {
    //! Fixtures shared by command-line operation tests.

    use std::collections::BTreeMap;

    use common::Money;
    use service::{
        domain::{pricing, property_type, PropertyType},
        infra::{database::memory::State, notifier, Memory},
        Config,
    };

    use crate::error::Kind;

    use super::{parse_input, Error};

    /// [`service::Service`] over in-memory infrastructure.
    pub(crate) type TestService = service::Service<Memory, notifier::Memory>;

    /// Creates a [`TestService`] with a single property type and package,
    /// along with its [`notifier::Memory`].
    pub(crate) fn service() -> (TestService, notifier::Memory) {
        let key = property_type::Key::new("einfamilienhaus").unwrap();
        let package = pricing::Key::new("besichtigung").unwrap();
        let state = State {
            property_types: BTreeMap::from([(
                key.clone(),
                PropertyType {
                    key,
                    label: "Einfamilienhaus".into(),
                    gnd: Some(80),
                    price_standard: Some(Money::eur(1000)),
                    request_only: false,
                    notes: None,
                },
            )]),
            pricing: BTreeMap::from([(
                package.clone(),
                pricing::Entry {
                    key: package,
                    label: "Vor-Ort-Besichtigung".into(),
                    category: pricing::Category::package(),
                    sort_order: 1,
                    price: Some(Money::eur(350)),
                },
            )]),
            ..State::default()
        };
        let ntf = notifier::Memory::default();
        let svc = service::Service::without_tasks(
            Config::default(),
            Memory::new(state),
            ntf.clone(),
        );
        (svc, ntf)
    }

    #[test]
    fn reports_malformed_input() {
        let err = parse_input::<serde_json::Value>(b"{\"a\":").unwrap_err();
        assert_eq!(err.code, "MALFORMED_INPUT");
        assert_eq!(err.kind, Kind::Validation);

        let err: Error = parse_input::<u8>(b"\"text\"").unwrap_err();
        assert_eq!(err.code, "INVALID_INPUT");
    }
}
