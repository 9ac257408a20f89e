//! Exports dividend, sales and position reports from the Binck web portal.
//!
//! A browser session logs in ([`portal::login`]), its cookies and
//! anti-forgery token are bridged into a plain HTTP client
//! ([`portal::PortalApiClient`]) and the reports in [`reports`] turn the
//! results into spreadsheets.

pub mod browser;
pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod export;
pub mod normalize;
pub mod portal;
pub mod reports;

pub use error::{Error, Result};
