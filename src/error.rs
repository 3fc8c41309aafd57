use std::sync::Arc;

use crate::ufc::VariationType;
use crate::value::Value;

/// Represents a result type for operations in the Eppo SDK.
///
/// This `Result` type is a standard Rust `Result` type where the error variant is defined by the
/// eppo-specific [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the Eppo SDK.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// An error occurred while parsing the configuration (server sent unexpected response). It is
    /// recommended to upgrade the Eppo SDK.
    #[error("error parsing configuration, try upgrading Eppo SDK")]
    ConfigurationParseError,

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The request was unauthorized, possibly due to an invalid SDK key.
    #[error("unauthorized, sdk_key is likely invalid")]
    Unauthorized,

    /// Indicates that the poller thread panicked. This should normally never happen.
    #[error("poller thread panicked")]
    PollerThreadPanicked,

    /// The poller thread gave up after too many consecutive fetch failures.
    #[error("poller thread exhausted consecutive failures")]
    PollerGaveUp,

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

/// Error that can occur during flag evaluation.
///
/// Evaluation errors are never returned from assignment getters (which fall back to the supplied
/// default), but they are surfaced through evaluation details.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EvaluationError {
    /// Requested flag has a different type than the requested one.
    #[error("invalid flag type (expected: {expected:?}, found: {found:?})")]
    TypeMismatch {
        /// Expected type of the flag.
        expected: VariationType,
        /// Actual type of the flag.
        found: VariationType,
    },

    /// The matched variation's value is incompatible with the flag's declared type. This is a
    /// configuration issue and normally never happens.
    #[error("variation {variation_key:?} has a value incompatible with the flag type")]
    AssignmentError {
        /// Key of the matched variation.
        variation_key: String,
        /// The offending value as it appears in the configuration.
        value: Value,
    },

    /// Configuration for this flag was received from the server but could not be parsed. This
    /// should normally never happen and is likely a signal that you should update the SDK.
    #[error("unexpected configuration error, try upgrading Eppo SDK")]
    UnexpectedConfigurationError,
}

/// Internal evaluation outcome covering both errors and normal no-assignment conditions.
///
/// Non-error failures (e.g., flag disabled) are normal and remapped to "no assignment" before
/// reaching the user.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub(crate) enum EvaluationFailure {
    #[error(transparent)]
    Error(EvaluationError),

    /// Configuration has not been fetched yet.
    #[error("configuration has not been fetched yet")]
    ConfigurationMissing,

    /// The flag is missing from the configuration or is disabled for the environment.
    #[error("flag is missing in configuration or is disabled")]
    FlagUnrecognizedOrDisabled,

    /// No allocation matched, so the flag serves the default.
    #[error("no allocations matched the subject")]
    DefaultAllocationNull,
}

impl From<EvaluationError> for EvaluationFailure {
    fn from(value: EvaluationError) -> Self {
        Self::Error(value)
    }
}
