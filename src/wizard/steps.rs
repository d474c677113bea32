//! Checkout step sequence and entry guards

use std::fmt;

use crate::state::WizardState;

/// The four steps of the checkout flow, in order.
///
/// Each step declares an entry guard over the fields of [`WizardState`] that
/// strictly precede it; a guard never inspects fields that belong to later
/// steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
    /// Step 1: pick an offer
    Offer,
    /// Step 2: enter customer data
    Customer,
    /// Step 3: preview the contract draft
    Preview,
    /// Step 4: e-sign
    Sign,
}

impl CheckoutStep {
    pub fn all() -> &'static [CheckoutStep] {
        &[
            CheckoutStep::Offer,
            CheckoutStep::Customer,
            CheckoutStep::Preview,
            CheckoutStep::Sign,
        ]
    }

    pub fn title(&self) -> &'static str {
        match self {
            CheckoutStep::Offer => "Select offer",
            CheckoutStep::Customer => "Customer data",
            CheckoutStep::Preview => "Contract preview",
            CheckoutStep::Sign => "Signature",
        }
    }

    /// The CLI subcommand that enters this step
    pub fn command(&self) -> &'static str {
        match self {
            CheckoutStep::Offer => "offers",
            CheckoutStep::Customer => "customer",
            CheckoutStep::Preview => "preview",
            CheckoutStep::Sign => "sign",
        }
    }

    /// Check that every strictly-prior state field is present
    pub fn is_ready(&self, state: &WizardState) -> bool {
        match self {
            CheckoutStep::Offer => true,
            CheckoutStep::Customer => state.offer_id.is_some(),
            CheckoutStep::Preview => state.offer_id.is_some() && state.counterparty_id.is_some(),
            CheckoutStep::Sign => {
                state.offer_id.is_some()
                    && state.counterparty_id.is_some()
                    && state.contract_id.is_some()
            }
        }
    }

    /// Entry guard: where to send the flow instead of entering this step.
    ///
    /// Missing prerequisites always redirect to offer selection. This is a
    /// navigation correction, not a failure, so there is nothing to report.
    pub fn entry_redirect(&self, state: &WizardState) -> Option<CheckoutStep> {
        if self.is_ready(state) {
            None
        } else {
            Some(CheckoutStep::Offer)
        }
    }

    /// The step a returning user should resume at
    pub fn first_incomplete(state: &WizardState) -> CheckoutStep {
        if state.offer_id.is_none() {
            CheckoutStep::Offer
        } else if state.counterparty_id.is_none() {
            CheckoutStep::Customer
        } else if state.contract_id.is_none() {
            CheckoutStep::Preview
        } else {
            CheckoutStep::Sign
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(
        offer_id: Option<i64>,
        counterparty_id: Option<i64>,
        contract_id: Option<&str>,
    ) -> WizardState {
        WizardState {
            offer_id,
            counterparty_id,
            contract_id: contract_id.map(str::to_string),
        }
    }

    #[test]
    fn test_offer_step_always_ready() {
        assert!(CheckoutStep::Offer.is_ready(&WizardState::default()));
        assert_eq!(
            CheckoutStep::Offer.entry_redirect(&WizardState::default()),
            None
        );
    }

    #[test]
    fn test_guards_check_only_prior_fields() {
        // Customer only needs the offer; later fields are irrelevant
        assert!(CheckoutStep::Customer.is_ready(&state(Some(1), None, None)));
        assert!(CheckoutStep::Preview.is_ready(&state(Some(1), Some(2), None)));
        assert!(CheckoutStep::Sign.is_ready(&state(Some(1), Some(2), Some("c-1"))));
    }

    #[test]
    fn test_missing_prerequisites_redirect_to_offer() {
        assert_eq!(
            CheckoutStep::Customer.entry_redirect(&WizardState::default()),
            Some(CheckoutStep::Offer)
        );
        assert_eq!(
            CheckoutStep::Preview.entry_redirect(&state(Some(1), None, None)),
            Some(CheckoutStep::Offer)
        );
        assert_eq!(
            CheckoutStep::Sign.entry_redirect(&state(Some(1), Some(2), None)),
            Some(CheckoutStep::Offer)
        );
    }

    #[test]
    fn test_first_incomplete_walks_the_sequence() {
        assert_eq!(
            CheckoutStep::first_incomplete(&WizardState::default()),
            CheckoutStep::Offer
        );
        assert_eq!(
            CheckoutStep::first_incomplete(&state(Some(1), None, None)),
            CheckoutStep::Customer
        );
        assert_eq!(
            CheckoutStep::first_incomplete(&state(Some(1), Some(2), None)),
            CheckoutStep::Preview
        );
        assert_eq!(
            CheckoutStep::first_incomplete(&state(Some(1), Some(2), Some("c-1"))),
            CheckoutStep::Sign
        );
    }
}
