//! Wire types for the contract portal API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A marketable offer as returned by `GET /offers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    /// Short internal code (e.g. "DM-SOLAR-12")
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// ISO 4217 currency code
    pub currency: String,
    pub price_cents: i64,
    /// Billing cadence (e.g. "monthly")
    pub billing_period: String,
    pub min_term_months: i32,
    pub notice_period_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Price formatted for display, e.g. "9.90 EUR/monthly"
    pub fn display_price(&self) -> String {
        format!(
            "{}.{:02} {}/{}",
            self.price_cents / 100,
            self.price_cents % 100,
            self.currency,
            self.billing_period
        )
    }
}

/// Counterparty payload for `POST /counterparties`.
///
/// The server validates type, country code and email; the client sends the
/// fields through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCounterparty {
    /// "person" or "company"
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    /// 2-letter uppercase country code
    pub country: String,
    pub email: String,
}

/// A stored counterparty with its server-assigned identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contract lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    AwaitingSignature,
    Signed,
    /// Statuses this client version does not know about yet
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractStatus::Draft => write!(f, "draft"),
            ContractStatus::AwaitingSignature => write!(f, "awaiting_signature"),
            ContractStatus::Signed => write!(f, "signed"),
            ContractStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A contract as returned by `POST /contracts/draft` and `GET /contracts/{id}`.
///
/// The GET variant embeds counterparty and offer summaries; the create
/// response omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    /// Server-assigned identifier, opaque to this client
    pub id: String,
    pub status: ContractStatus,
    pub counterparty_id: i64,
    pub offer_id: i64,
    #[serde(default)]
    pub draft_pdf_available: bool,
    #[serde(default)]
    pub counterparty: Option<Counterparty>,
    #[serde(default)]
    pub offer: Option<Offer>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    pub fn is_signed(&self) -> bool {
        self.status == ContractStatus::Signed
    }
}

/// Signing session returned by `POST /contracts/{id}/signing/start`.
///
/// Ephemeral: held in memory for the duration of the sign step, never
/// persisted alongside the wizard state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningSession {
    pub contract_id: String,
    pub status: ContractStatus,
    pub provider: String,
    pub provider_envelope_id: String,
    pub signing_url: String,
}
