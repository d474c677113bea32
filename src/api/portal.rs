//! HTTP client for the contract portal REST API

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::api::error::{error_message, ApiError};
use crate::api::models::{Contract, Counterparty, NewCounterparty, Offer, SigningSession};

const USER_AGENT: &str = concat!("checkout-cli/", env!("CARGO_PKG_VERSION"));

/// Typed client for the portal endpoints.
///
/// Holds no state beyond the base URL and the connection pool; retries and
/// flow decisions belong to the callers.
pub struct PortalClient {
    base_url: String,
    client: reqwest::Client,
    extra_headers: HeaderMap,
}

#[derive(Debug, Serialize)]
struct DraftRequest {
    counterparty_id: i64,
    offer_id: i64,
}

impl PortalClient {
    /// Create a client against the given base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a client with an explicit request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::network(e.to_string()))?;
        Ok(Self {
            base_url,
            client,
            extra_headers: HeaderMap::new(),
        })
    }

    /// Attach a header to every request. The JSON content type cannot be
    /// overridden this way; it is applied after these headers.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::try_from(name).map_err(|e| ApiError::network(e.to_string()))?;
        let value = HeaderValue::try_from(value).map_err(|e| ApiError::network(e.to_string()))?;
        self.extra_headers.insert(name, value);
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List active offers
    pub async fn list_offers(&self) -> Result<Vec<Offer>, ApiError> {
        self.get_json("/offers").await
    }

    /// Create a counterparty record
    pub async fn create_counterparty(
        &self,
        new: &NewCounterparty,
    ) -> Result<Counterparty, ApiError> {
        self.post_json("/counterparties", new).await
    }

    /// Create a contract draft from a counterparty + offer pair
    pub async fn create_draft(
        &self,
        counterparty_id: i64,
        offer_id: i64,
    ) -> Result<Contract, ApiError> {
        let body = DraftRequest {
            counterparty_id,
            offer_id,
        };
        self.post_json("/contracts/draft", &body).await
    }

    /// Fetch a contract, including embedded counterparty and offer summaries
    pub async fn get_contract(&self, contract_id: &str) -> Result<Contract, ApiError> {
        self.get_json(&format!("/contracts/{}", contract_id)).await
    }

    /// Start the signing process for a contract
    pub async fn start_signing(&self, contract_id: &str) -> Result<SigningSession, ApiError> {
        self.post_empty(&format!("/contracts/{}/signing/start", contract_id))
            .await
    }

    /// URL of the draft PDF. Computed locally; the PDF is fetched by the
    /// user's browser or download tool, not through this JSON client.
    pub fn draft_pdf_url(&self, contract_id: &str) -> String {
        format!("{}/contracts/{}/draft-pdf", self.base_url, contract_id)
    }

    /// URL of the signed PDF, available once the contract is signed
    pub fn signed_pdf_url(&self, contract_id: &str) -> String {
        format!("{}/contracts/{}/signed-pdf", self.base_url, contract_id)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("portal GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.extra_headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        Self::read_json(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("portal POST {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.extra_headers.clone())
            .json(body)
            // reqwest only sets the content type when absent; extra headers
            // must not be able to override it
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        Self::read_json(response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("portal POST {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.extra_headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        Self::read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::http(
                status.as_u16(),
                error_message(status.as_u16(), &body),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ApiError::parse(e.to_string()))
    }
}
