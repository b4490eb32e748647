//! [`Error`]-related definitions.

use std::{fmt, io, process::ExitCode};

use derive_more::Error as StdError;
use itertools::Itertools as _;
use serde::{Serialize, Serializer};
use service::infra::database;
use tracerr::{Trace, Traced};

/// Defines a new error type convertible into an [`Error`].
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_error {
    (
        enum $name:ident {
            $(
                #[code = $code:literal]
                #[kind = $kind:ident]
                $( #[field = $field:literal] )?
                #[message = $message:literal]
                $variant:ident
            ),* $(,)?
        }
    ) => {
        /// Error type.
        #[derive(
            Clone,
            Copy,
            Debug,
            ::derive_more::Display,
            ::derive_more::Error
        )]
        #[repr(u16)]
        pub enum $name {
            $(
                #[display($message)]
                #[doc = $message]
                $variant,
            )*
        }

        impl From<$name> for $crate::Error {
            fn from(err: $name) -> Self {
                match err {
                    $(
                        $name::$variant => Self {
                            code: $code,
                            kind: $crate::error::Kind::$kind,
                            field: None $( .or(Some($field)) )?,
                            message: $message.to_string(),
                            backtrace: None,
                        },
                    )*
                }
            }
        }
    };
}

/// Presentation [`Error`] of the application.
#[derive(Clone, Debug, Serialize, StdError)]
pub struct Error {
    /// [`Error`] code.
    pub code: Code,

    /// [`Kind`] of this [`Error`].
    pub kind: Kind,

    /// Input field this [`Error`] relates to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,

    /// [`Error`] message.
    pub message: String,

    /// Backtrace of this [`Error`].
    #[error(not(backtrace))]
    #[serde(
        serialize_with = "serialize_trace",
        skip_serializing_if = "Option::is_none"
    )]
    pub backtrace: Option<Trace>,
}

impl Error {
    /// Create a new [`Error`] representing an infrastructure failure.
    #[must_use]
    pub fn internal(msg: &impl ToString) -> Self {
        Self {
            code: "INTERNAL_ERROR",
            kind: Kind::Infrastructure,
            field: None,
            message: msg.to_string(),
            backtrace: None,
        }
    }

    /// Creates a new [`Error`] representing a malformed input.
    #[must_use]
    pub fn invalid_input(msg: &impl ToString) -> Self {
        Self {
            code: "INVALID_INPUT",
            kind: Kind::Validation,
            field: None,
            message: msg.to_string(),
            backtrace: None,
        }
    }

    /// Returns the [`ExitCode`] the process should exit with on this
    /// [`Error`].
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.kind.exit_status())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            code,
            kind,
            field,
            message,
            backtrace,
        } = self;

        write!(f, "[{code}] {kind}")?;
        if let Some(field) = field {
            write!(f, " `{field}`")?;
        }
        write!(
            f,
            ": {message}{}",
            backtrace
                .iter()
                .format_with("\n", |trace, f| f(&format_args!("\n{trace}"))),
        )
    }
}

/// Serializes the provided [`Trace`] as a list of its frames.
fn serialize_trace<S: Serializer>(
    trace: &Option<Trace>,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_seq(
        trace
            .iter()
            .flat_map(|t| t.iter())
            .map(ToString::to_string),
    )
}

/// [`Error`] code.
pub type Code = &'static str;

/// Kind of an [`Error`].
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Input is invalid and may be corrected by the caller.
    #[display("validation")]
    Validation,

    /// Operation conflicts with the current state of an entity.
    #[display("state conflict")]
    StateConflict,

    /// Requested entity doesn't exist.
    #[display("not found")]
    NotFound,

    /// Storage or another infrastructure failed.
    #[display("infrastructure")]
    Infrastructure,
}

impl Kind {
    /// Returns the process exit status representing this [`Kind`].
    #[must_use]
    pub const fn exit_status(self) -> u8 {
        match self {
            Self::Infrastructure => 1,
            Self::Validation => 3,
            Self::StateConflict => 4,
            Self::NotFound => 5,
        }
    }
}

/// Helper trait for converting types into [`Error`]s.
pub trait AsError {
    /// Tries to convert the type into an [`Error`].
    ///
    /// [`None`] is returned if the type cannot be converted into an [`Error`].
    fn try_as_error(&self) -> Option<Error>;

    /// Converts the type into an [`Error`].
    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        self.try_as_error()
            .unwrap_or_else(|| Error::internal(&self))
    }

    /// Converts the type into an [`Error`] by consuming it.
    fn into_error(self) -> Error
    where
        Self: fmt::Display + Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = self.as_ref().try_as_error()?;
        error.backtrace = Some(self.trace().clone());
        Some(error)
    }
}

impl AsError for database::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

impl AsError for io::Error {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error::invalid_input(&format!("failed to read input: {self}")))
    }
}

impl AsError for serde_json::Error {
    fn try_as_error(&self) -> Option<Error> {
        self.is_io()
            .then(|| Error::internal(&self))
            .or_else(|| Some(Error::invalid_input(&self)))
    }
}

#[cfg(test)]
mod spec {
    use super::{AsError as _, Error, Kind};

    crate::define_error! {
        enum Sample {
            #[code = "WITH_FIELD"]
            #[kind = Validation]
            #[field = "steuerjahr"]
            #[message = "Das Steuerjahr ist erforderlich."]
            WithField,

            #[code = "WITHOUT_FIELD"]
            #[kind = StateConflict]
            #[message = "Konflikt"]
            WithoutField,
        }
    }

    #[test]
    fn defines_errors() {
        let err = Error::from(Sample::WithField);
        assert_eq!(err.code, "WITH_FIELD");
        assert_eq!(err.kind, Kind::Validation);
        assert_eq!(err.field, Some("steuerjahr"));
        assert_eq!(err.message, "Das Steuerjahr ist erforderlich.");

        let err = Error::from(Sample::WithoutField);
        assert_eq!(err.kind, Kind::StateConflict);
        assert_eq!(err.field, None);
    }

    #[test]
    fn serializes_without_empty_parts() {
        let json = serde_json::to_value(Error::from(Sample::WithoutField))
            .unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "code": "WITHOUT_FIELD",
                "kind": "state_conflict",
                "message": "Konflikt",
            }),
        );
    }

    #[test]
    fn distinguishes_exit_statuses() {
        let kinds = [
            Kind::Validation,
            Kind::StateConflict,
            Kind::NotFound,
            Kind::Infrastructure,
        ];
        for (i, a) in kinds.iter().enumerate() {
            assert_ne!(a.exit_status(), 0);
            for b in &kinds[i + 1..] {
                assert_ne!(a.exit_status(), b.exit_status());
            }
        }
    }

    #[test]
    fn reports_malformed_json_as_invalid_input() {
        let err = serde_json::from_str::<u8>("{").unwrap_err().as_error();

        assert_eq!(err.code, "INVALID_INPUT");
        assert_eq!(err.kind, Kind::Validation);
    }
}
