//! The public error type. Internally we use `anyhow` everywhere (`Res`), and at the boundary of
//! each pipeline stage the error is tagged with the `ErrorType` of the stage that failed.

use std::fmt::{Debug, Display};

/// Internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// Public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The stage of the run that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// `config.json` could not be read or parsed.
    Config,
    /// The aggregator password or the OAuth client secrets could not be obtained.
    Credential,
    /// The OAuth authorization, exchange, refresh or token persistence failed.
    #[serde(rename = "oauth")]
    OAuth,
    /// The aggregator tool failed or the test fixture could not be read.
    Fetch,
    /// The transaction JSON was malformed.
    Decode,
    /// The report spreadsheet could not be copied, fetched, or its sheet located.
    Provision,
    /// The batched cell updates could not be committed.
    Synchronize,
}

serde_plain::derive_display_from_serialize!(ErrorType);

/// An error that ended the run, tagged with the stage it came from.
#[derive(Debug, thiserror::Error)]
#[error("{error_type} error: {inner:#}")]
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            inner: source.into(),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }
}

/// Converts an internal result into a public one by tagging the error with an `ErrorType`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error> + Send + Sync + Debug + Display + 'static,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}
