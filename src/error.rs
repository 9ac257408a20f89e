//! Error types for portal sessions, API calls and report building.
//!
//! None of these are retried. Each one aborts the running report and is
//! surfaced to the command, which exits non-zero.

use std::time::Duration;

use thiserror::Error;

use crate::browser::WaitCondition;

/// A specialized `Result` type for portal and report operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A DOM condition was never satisfied within the wait timeout.
    #[error("timed out after {waited:?} waiting for `{selector}` to be {condition}")]
    Timeout {
        selector: String,
        condition: WaitCondition,
        waited: Duration,
    },

    /// The login flow could not reach the expected post-login state.
    #[error("login failed while {stage}: {source}")]
    Authentication {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// The current page carries no anti-forgery token.
    #[error("could not find the request verification token on {url}")]
    TokenNotFound { url: String },

    /// A cookie required for bridging the session is absent.
    #[error("value for cookie '{name}' on {domain} could not be retrieved")]
    MissingCookie { domain: String, name: String },

    /// The portal API answered with something other than 200.
    #[error("request to {endpoint} returned status code {status}")]
    HttpStatus { endpoint: String, status: u16 },

    /// The portal API answered with a body that is not the expected JSON.
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    /// A report that only handles one result page received more.
    #[error(
        "there are {total_pages} result pages for {query} but multipage results are not implemented yet"
    )]
    UnsupportedPagination { total_pages: u32, query: String },

    /// A transaction type without an entry in the translation table.
    #[error("unknown transaction type '{0}'")]
    UnknownTransactionType(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid date '{0}', expected dd/mm/yyyy")]
    InvalidDate(String),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A form field, button or link the flow needs to interact with is missing.
    #[error("no {kind} matching '{locator}' on the page")]
    ElementNotFound { kind: &'static str, locator: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("spreadsheet error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn authentication(stage: &'static str, source: Error) -> Self {
        Error::Authentication {
            stage,
            source: Box::new(source),
        }
    }
}
