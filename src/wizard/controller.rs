//! Entry actions for the checkout steps.
//!
//! The controller owns the state store and the portal client; each method is
//! one step's entry action: run the guard, call the portal, merge the new
//! reference into the stored state.

use std::sync::Arc;
use tracing::{debug, info};

use crate::api::{
    ApiError, Contract, Counterparty, NewCounterparty, Offer, PortalApi, SigningSession,
};
use crate::state::{StateStore, WizardState, WizardStateUpdate};
use crate::wizard::steps::CheckoutStep;

/// Outcome of entering a step: either the entry action ran, or the guard
/// bounced the flow back to an earlier step.
#[derive(Debug)]
pub enum StepEntry<T> {
    Done(T),
    Redirected(CheckoutStep),
}

impl<T> StepEntry<T> {
    pub fn is_redirected(&self) -> bool {
        matches!(self, StepEntry::Redirected(_))
    }
}

pub struct WizardController<S: StateStore> {
    api: Arc<dyn PortalApi>,
    store: S,
}

impl<S: StateStore> WizardController<S> {
    pub fn new(api: Arc<dyn PortalApi>, store: S) -> Self {
        Self { api, store }
    }

    /// Current persisted progress
    pub fn state(&self) -> WizardState {
        self.store.load()
    }

    /// The step a returning user should pick up at
    pub fn resume_step(&self) -> CheckoutStep {
        CheckoutStep::first_incomplete(&self.store.load())
    }

    /// Step 1 display: the active offers
    pub async fn list_offers(&self) -> Result<Vec<Offer>, ApiError> {
        self.api.list_offers().await
    }

    /// Step 1: record the chosen offer. Only the identifier is kept; the
    /// server re-validates it on every later call.
    pub fn select_offer(&self, offer_id: i64) {
        info!(offer_id, "offer selected");
        self.store.save(WizardStateUpdate::offer(offer_id));
    }

    /// Step 2: create the counterparty and remember its identifier
    pub async fn submit_customer(
        &self,
        new: &NewCounterparty,
    ) -> Result<StepEntry<Counterparty>, ApiError> {
        let state = self.store.load();
        if let Some(redirect) = CheckoutStep::Customer.entry_redirect(&state) {
            return Ok(StepEntry::Redirected(redirect));
        }

        let counterparty = self.api.create_counterparty(new).await?;
        info!(counterparty_id = counterparty.id, "counterparty created");
        self.store
            .save(WizardStateUpdate::counterparty(counterparty.id));
        Ok(StepEntry::Done(counterparty))
    }

    /// Step 3: materialize the contract draft.
    ///
    /// Idempotent: when a contract reference is already stored, the existing
    /// contract is fetched and reused. If that fetch fails for any reason, a
    /// fresh draft is created as if no reference existed.
    pub async fn prepare_preview(&self) -> Result<StepEntry<Contract>, ApiError> {
        let state = self.store.load();
        if let Some(redirect) = CheckoutStep::Preview.entry_redirect(&state) {
            return Ok(StepEntry::Redirected(redirect));
        }
        let (Some(offer_id), Some(counterparty_id)) = (state.offer_id, state.counterparty_id)
        else {
            return Ok(StepEntry::Redirected(CheckoutStep::Offer));
        };

        if let Some(contract_id) = &state.contract_id {
            match self.api.get_contract(contract_id).await {
                Ok(contract) => {
                    debug!(contract_id = %contract.id, "reusing existing contract draft");
                    return Ok(StepEntry::Done(contract));
                }
                Err(err) => {
                    debug!("stored contract reference unusable ({}), creating a new draft", err);
                }
            }
        }

        let contract = self.api.create_draft(counterparty_id, offer_id).await?;
        info!(contract_id = %contract.id, "contract draft created");
        self.store
            .save(WizardStateUpdate::contract(contract.id.clone()));
        Ok(StepEntry::Done(contract))
    }

    /// Step 4 entry: re-fetch the contract once, so the caller can see its
    /// current status before deciding whether to start a signing session
    pub async fn fetch_contract(&self) -> Result<StepEntry<Contract>, ApiError> {
        let state = self.store.load();
        if let Some(redirect) = CheckoutStep::Sign.entry_redirect(&state) {
            return Ok(StepEntry::Redirected(redirect));
        }
        let Some(contract_id) = state.contract_id else {
            return Ok(StepEntry::Redirected(CheckoutStep::Offer));
        };

        let contract = self.api.get_contract(&contract_id).await?;
        Ok(StepEntry::Done(contract))
    }

    /// Step 4: start the signing session for the stored contract
    pub async fn start_signing(&self) -> Result<StepEntry<SigningSession>, ApiError> {
        let state = self.store.load();
        if let Some(redirect) = CheckoutStep::Sign.entry_redirect(&state) {
            return Ok(StepEntry::Redirected(redirect));
        }
        let Some(contract_id) = state.contract_id else {
            return Ok(StepEntry::Redirected(CheckoutStep::Offer));
        };

        let session = self.api.start_signing(&contract_id).await?;
        info!(
            contract_id = %session.contract_id,
            envelope = %session.provider_envelope_id,
            "signing session started"
        );
        Ok(StepEntry::Done(session))
    }

    /// Flow finished: the signature came back confirmed
    pub fn complete(&self) {
        info!("checkout complete, clearing stored progress");
        self.store.clear();
    }

    /// Explicit restart requested by the user
    pub fn restart(&self) {
        info!("checkout restarted, clearing stored progress");
        self.store.clear();
    }

    /// Draft PDF URL for a contract
    pub fn draft_pdf_url(&self, contract_id: &str) -> String {
        self.api.draft_pdf_url(contract_id)
    }

    /// Signed PDF URL for a contract
    pub fn signed_pdf_url(&self, contract_id: &str) -> String {
        self.api.signed_pdf_url(contract_id)
    }
}
