//! HTTP access to the contract portal
//!
//! This module provides:
//! - Typed wire models matching the portal's JSON
//! - `PortalClient`, the reqwest-backed resource client
//! - The `PortalApi` trait, so flow logic can run against fakes in tests

pub mod error;
pub mod models;
pub mod portal;

pub use error::ApiError;
pub use models::{Contract, ContractStatus, Counterparty, NewCounterparty, Offer, SigningSession};
pub use portal::PortalClient;

use async_trait::async_trait;

/// Backend-agnostic view of the portal endpoints the checkout flow needs.
///
/// `PortalClient` is the production implementation; tests substitute
/// in-memory fakes. All methods are pass-through requests with no business
/// logic, matching the endpoints one to one.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// List active offers
    async fn list_offers(&self) -> Result<Vec<Offer>, ApiError>;

    /// Create a counterparty record
    async fn create_counterparty(&self, new: &NewCounterparty) -> Result<Counterparty, ApiError>;

    /// Create a contract draft from a counterparty + offer pair
    async fn create_draft(&self, counterparty_id: i64, offer_id: i64)
        -> Result<Contract, ApiError>;

    /// Fetch a contract by identifier
    async fn get_contract(&self, contract_id: &str) -> Result<Contract, ApiError>;

    /// Start the signing process for a contract
    async fn start_signing(&self, contract_id: &str) -> Result<SigningSession, ApiError>;

    /// Compute the draft PDF download URL (no network)
    fn draft_pdf_url(&self, contract_id: &str) -> String;

    /// Compute the signed PDF download URL (no network)
    fn signed_pdf_url(&self, contract_id: &str) -> String;
}

#[async_trait]
impl PortalApi for PortalClient {
    async fn list_offers(&self) -> Result<Vec<Offer>, ApiError> {
        PortalClient::list_offers(self).await
    }

    async fn create_counterparty(&self, new: &NewCounterparty) -> Result<Counterparty, ApiError> {
        PortalClient::create_counterparty(self, new).await
    }

    async fn create_draft(
        &self,
        counterparty_id: i64,
        offer_id: i64,
    ) -> Result<Contract, ApiError> {
        PortalClient::create_draft(self, counterparty_id, offer_id).await
    }

    async fn get_contract(&self, contract_id: &str) -> Result<Contract, ApiError> {
        PortalClient::get_contract(self, contract_id).await
    }

    async fn start_signing(&self, contract_id: &str) -> Result<SigningSession, ApiError> {
        PortalClient::start_signing(self, contract_id).await
    }

    fn draft_pdf_url(&self, contract_id: &str) -> String {
        PortalClient::draft_pdf_url(self, contract_id)
    }

    fn signed_pdf_url(&self, contract_id: &str) -> String {
        PortalClient::signed_pdf_url(self, contract_id)
    }
}
