//! External card-charge collaborator.
//!
//! The ledger only sees the [`PaymentGateway`] trait. [`StripeGateway`] is
//! the HTTP implementation; it gets its key and endpoint from
//! [`PaymentConfig`] when it is built. Calls are blocking, so async callers
//! must run them on a blocking thread.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PaymentConfig;
use crate::models::Amount;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    /// Gateway rejected the charge; message is the gateway's own.
    #[error("{0}")]
    Declined(String),

    #[error("Payment gateway unreachable: {0}")]
    Transport(String),

    #[error("Unexpected payment gateway response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount: Amount,
    pub description: String,
    /// Opaque payment-method token from the client.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    pub charge_id: String,
}

pub trait PaymentGateway: Send + Sync {
    fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError>;
}

// ═══════════════════════════════════════════
// Stripe-compatible HTTP client
// ═══════════════════════════════════════════

pub struct StripeGateway {
    config: PaymentConfig,
}

#[derive(Serialize)]
struct ChargeForm<'a> {
    amount: i64,
    currency: &'a str,
    description: &'a str,
    source: &'a str,
}

#[derive(Deserialize)]
struct ChargeResponse {
    id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl StripeGateway {
    pub fn new(config: PaymentConfig) -> Self {
        Self { config }
    }

    fn charges_url(&self) -> String {
        format!("{}/v1/charges", self.config.api_base.trim_end_matches('/'))
    }
}

impl PaymentGateway for StripeGateway {
    fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        if self.config.secret_key.is_empty() {
            return Err(GatewayError::NotConfigured);
        }

        // Blocking clients own a runtime; build it here, on the caller's
        // blocking thread, never on an async worker.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let form = ChargeForm {
            amount: request.amount.minor_units(),
            currency: &self.config.currency,
            description: &request.description,
            source: &request.source,
        };

        let response = client
            .post(self.charges_url())
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Transport(format!(
                        "request timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => GatewayError::Declined(envelope.error.message),
                Err(_) => GatewayError::InvalidResponse(format!("HTTP {}", status.as_u16())),
            });
        }

        let parsed: ChargeResponse =
            serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        tracing::info!(charge_id = %parsed.id, amount = %request.amount, "Charge succeeded");
        Ok(ChargeReceipt { charge_id: parsed.id })
    }
}

// ═══════════════════════════════════════════
// Test double
// ═══════════════════════════════════════════
