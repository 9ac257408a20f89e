//! Client for the portal's internal JSON endpoints.
//!
//! These are the endpoints the web UI calls over XHR. They take form-encoded
//! POSTs and authenticate with the browser's cookies plus the anti-forgery
//! token, both supplied through a [`CredentialBundle`].

use reqwest::header::{ACCEPT, COOKIE, ORIGIN, REFERER};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::auth::{parse_url, CredentialBundle, TOKEN_HEADER};
use crate::{Error, Result};

/// Page the result endpoints are normally requested from.
pub const RESULTS_OVERVIEW_PATH: &str = "/ResultsOverview/Index";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/145.0.0.0 Safari/537.36";

/// Portal API client using cookie-based authentication.
pub struct PortalApiClient {
    client: Client,
    base_url: Url,
}

impl PortalApiClient {
    /// Create a client for the portal at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base_url: parse_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST `params` to `endpoint` and return the decoded JSON body.
    pub async fn call(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        credentials: &CredentialBundle,
    ) -> Result<serde_json::Value> {
        let body = self.send(endpoint, params, credentials).await?;
        decode(endpoint, &body)
    }

    /// Like [`call`](Self::call), decoding into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        credentials: &CredentialBundle,
    ) -> Result<T> {
        let body = self.send(endpoint, params, credentials).await?;
        decode(endpoint, &body)
    }

    async fn send(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        credentials: &CredentialBundle,
    ) -> Result<String> {
        let url = self.base_url.join(endpoint).map_err(|e| Error::InvalidUrl {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let referer = self
            .base_url
            .join(RESULTS_OVERVIEW_PATH)
            .map_err(|e| Error::InvalidUrl {
                url: RESULTS_OVERVIEW_PATH.to_string(),
                reason: e.to_string(),
            })?;

        let mut request = self
            .client
            .post(url.clone())
            .header(ACCEPT, "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .header(ORIGIN, self.base_url.origin().ascii_serialization())
            .header(REFERER, referer.as_str())
            .header(TOKEN_HEADER, credentials.token.as_str())
            .form(params);
        if let Some(cookies) = url
            .host_str()
            .and_then(|host| credentials.cookie_header_for(host))
        {
            request = request.header(COOKIE, cookies);
        }

        debug!(endpoint, params = ?params, "calling portal API");
        let response = request.send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(500)
                .collect();
            debug!(endpoint, status = status.as_u16(), %body, "portal API call failed");
            return Err(Error::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::MalformedResponse {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}
