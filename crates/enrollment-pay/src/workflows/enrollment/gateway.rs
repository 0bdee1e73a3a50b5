use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// Capture request sent to the payment processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRequest {
    pub amount_cents: u64,
    pub currency: String,
    pub payment_token: String,
    /// Repeated submissions with the same key must not capture twice.
    pub idempotency_key: String,
    pub metadata: BTreeMap<String, String>,
}

/// Processor-reported state of a capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    RequiresAction,
    Processing,
    Canceled,
    Failed,
}

impl ChargeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ChargeStatus::Succeeded => "succeeded",
            ChargeStatus::RequiresAction => "requires_action",
            ChargeStatus::Processing => "processing",
            ChargeStatus::Canceled => "canceled",
            ChargeStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    pub status: ChargeStatus,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The processor refused the instrument; `message` is processor-native text.
    #[error("{message}")]
    Declined {
        code: Option<String>,
        message: String,
    },
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// External payment processor. Captures are never retried by callers.
pub trait PaymentGateway: Debug + Send + Sync {
    fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError>;
}
