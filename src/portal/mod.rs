//! Access to the Binck web portal.
//!
//! [`auth`] logs a browser in and bridges its session into a
//! [`CredentialBundle`]; [`api`] calls the JSON endpoints with it and
//! [`pagination`] walks their multi-page results.

pub mod api;
pub mod auth;
pub mod models;
pub mod pagination;

pub use api::PortalApiClient;
pub use auth::{login, BridgedCookie, CredentialBundle, Session};
pub use pagination::{
    PageSource, PaginatedFetcher, PositionMutationPages, ResultCategory, ResultPage, ResultYear,
    ResultsHistoryPages,
};
