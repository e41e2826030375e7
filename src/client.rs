//! HTTP client for the report service
//!
//! One method per network stage of the workflow. Each call is issued exactly
//! once; failures are logged and returned, never retried.

use crate::config::{Endpoints, ServiceConfig};
use crate::error::{Error, Result};
use crate::types::{
    AccessToken, Credentials, InstanceId, LIST_PAGE_SIZE, ReportId, ReportInstance,
    ReportListing, Stage,
};
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Token endpoint response for the client-credentials grant
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Body of the instance search request
#[derive(Serialize)]
struct SearchRequest<'a> {
    offset: &'a str,
    page_size: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    data: SearchData,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(default)]
    results: Vec<ReportInstance>,
}

/// Client for the token endpoint and the report API
#[derive(Clone, Debug)]
pub struct ReportClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl ReportClient {
    /// Build a client for the configured service
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoints are malformed or the HTTP
    /// client cannot be created.
    pub fn new(service: &ServiceConfig) -> Result<Self> {
        let endpoints = service.endpoints()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = service.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            Error::config("request_timeout", format!("failed to create HTTP client: {e}"))
        })?;

        Ok(Self { http, endpoints })
    }

    /// Resolved endpoints this client talks to
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchange client credentials for a bearer token
    pub async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken> {
        let stage = Stage::Authenticate;
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret()),
        ];

        let response = self
            .http
            .post(&self.endpoints.auth_url)
            .form(&params)
            .send()
            .await
            .map_err(|source| network_error(stage, source))?;
        let response = check_status(stage, response).await?;
        let token: TokenResponse = read_json(stage, response).await?;

        if token.access_token.is_empty() {
            return Err(Error::UnexpectedResponse {
                stage,
                message: "token response contained an empty access_token".to_string(),
            });
        }

        debug!(
            token_type = token.token_type.as_deref().unwrap_or("unknown"),
            expires_in = ?token.expires_in,
            "obtained access token"
        );
        Ok(AccessToken::new(token.access_token))
    }

    /// Ask the service to regenerate a report
    pub async fn trigger_run(&self, report_id: &ReportId, token: &AccessToken) -> Result<()> {
        let stage = Stage::Trigger;
        let response = self
            .http
            .post(self.endpoints.run_url(report_id))
            .bearer_auth(token.expose())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|source| network_error(stage, source))?;
        check_status(stage, response).await?;

        info!(report_id = %report_id, "Running report...");
        Ok(())
    }

    /// Fetch one page of generated instances, newest first
    pub async fn list_instances(
        &self,
        report_id: &ReportId,
        token: &AccessToken,
    ) -> Result<ReportListing> {
        let stage = Stage::List;
        let body = SearchRequest {
            offset: "",
            page_size: LIST_PAGE_SIZE,
        };

        let response = self
            .http
            .post(self.endpoints.search_url(report_id))
            .bearer_auth(token.expose())
            .json(&body)
            .send()
            .await
            .map_err(|source| network_error(stage, source))?;
        let response = check_status(stage, response).await?;
        let search: SearchResponse = read_json(stage, response).await?;

        let listing = ReportListing::from_unsorted(search.data.results);
        info!(report_id = %report_id, instances = listing.len(), "Getting report list...");
        if listing.truncated() {
            warn!(
                report_id = %report_id,
                page_size = LIST_PAGE_SIZE,
                "listing page is full, older instances are not visible"
            );
        }
        Ok(listing)
    }

    /// Download the raw artifact of one instance
    pub async fn download(&self, instance_id: &InstanceId, token: &AccessToken) -> Result<Vec<u8>> {
        let stage = Stage::Download;
        let response = self
            .http
            .get(self.endpoints.download_url(instance_id))
            .bearer_auth(token.expose())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|source| network_error(stage, source))?;
        let response = check_status(stage, response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|source| network_error(stage, source))?;

        info!(instance_id = %instance_id, bytes = bytes.len(), "Downloading report...");
        Ok(bytes.to_vec())
    }
}

fn network_error(stage: Stage, source: reqwest::Error) -> Error {
    error!(%stage, error = %source, timeout = source.is_timeout(), "request failed");
    Error::Network { stage, source }
}

async fn check_status(stage: Stage, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!(%stage, status = status.as_u16(), "service returned error status");
    Err(Error::http(stage, status.as_u16(), &body))
}

async fn read_json<T: serde::de::DeserializeOwned>(
    stage: Stage,
    response: reqwest::Response,
) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|source| network_error(stage, source))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        error!(%stage, error = %e, "could not parse response body");
        Error::UnexpectedResponse {
            stage,
            message: e.to_string(),
        }
    })
}
