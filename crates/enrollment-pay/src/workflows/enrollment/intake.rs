//! Request validation for the payment endpoint.
//!
//! Fields are checked in a fixed order and the first failure wins, so the error a client
//! sees is deterministic even when several fields are missing.

use serde_json::{Map, Value};

use super::catalog::{Tier, TierCatalog};
use super::domain::{ApplicantEmail, PaymentMethod};
use super::pricing::PricingPolicy;

/// Hidden form field that humans never fill in.
pub const HONEYPOT_FIELD: &str = "bot-field";

const TIER_FIELDS: [&str; 2] = ["tier", "programFee"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Request body must be a JSON object")]
    MalformedBody,
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("Invalid {field} selection: {value}")]
    UnknownTier { field: &'static str, value: String },
    #[error("Invalid paymentMethod: {value} (expected credit-card or invoice)")]
    InvalidPaymentMethod { value: String },
    #[error("{field} must be a whole number between 0 and {max}")]
    InvalidCount { field: &'static str, max: u32 },
}

impl ValidationError {
    /// Wire name of the offending field, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::MalformedBody => None,
            ValidationError::MissingField { field }
            | ValidationError::UnknownTier { field, .. }
            | ValidationError::InvalidCount { field, .. } => Some(field),
            ValidationError::InvalidPaymentMethod { .. } => Some("paymentMethod"),
        }
    }
}

/// Normalized, fully-populated payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub applicant: ApplicantEmail,
    pub name: String,
    pub tier: Tier,
    pub payment_method: PaymentMethod,
    pub company: String,
    pub job_title: String,
    pub phone: String,
    pub country: String,
    pub additional_seats: u32,
    pub support_hours: u32,
    /// Opaque gateway token; present iff the method is `credit-card`.
    pub payment_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Honeypot tripped: answer with a generic success and do nothing else.
    Spam,
    Accepted(PaymentRequest),
}

pub struct RequestValidator<'a> {
    catalog: &'a TierCatalog,
    policy: &'a PricingPolicy,
}

impl<'a> RequestValidator<'a> {
    pub fn new(catalog: &'a TierCatalog, policy: &'a PricingPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn validate(&self, body: &Value) -> Result<IntakeOutcome, ValidationError> {
        let outer = body.as_object().ok_or(ValidationError::MalformedBody)?;
        if honeypot_filled(outer) {
            return Ok(IntakeOutcome::Spam);
        }
        let payload = match outer.get("payment") {
            Some(Value::Object(inner)) => inner,
            Some(_) => return Err(ValidationError::MalformedBody),
            None => outer,
        };
        if honeypot_filled(payload) {
            return Ok(IntakeOutcome::Spam);
        }

        let applicant = required_text(payload, "applicant")?;
        let name = required_text(payload, "name")?;
        let tier = self.tier(payload)?;

        let method_raw = required_text(payload, "paymentMethod")?;
        let payment_method = PaymentMethod::parse(&method_raw)
            .ok_or(ValidationError::InvalidPaymentMethod { value: method_raw })?;

        let company = required_text(payload, "company")?;
        let job_title = required_text(payload, "jobTitle")?;
        let phone = required_text(payload, "phone")?;
        let country = required_text(payload, "country")?;

        let additional_seats = optional_count(
            payload,
            "additionalSeats",
            self.policy.max_additional_seats,
        )?;
        let support_hours =
            optional_count(payload, "addonSupportHours", self.policy.max_support_hours)?;

        let payment_token = match payment_method {
            PaymentMethod::CreditCard => Some(required_text(payload, "paymentMethodId")?),
            PaymentMethod::Invoice => None,
        };

        Ok(IntakeOutcome::Accepted(PaymentRequest {
            applicant: ApplicantEmail::new(&applicant),
            name,
            tier,
            payment_method,
            company,
            job_title,
            phone,
            country,
            additional_seats,
            support_hours,
            payment_token,
        }))
    }

    fn tier(&self, payload: &Map<String, Value>) -> Result<Tier, ValidationError> {
        let (field, selector) = TIER_FIELDS
            .iter()
            .find_map(|field| text(payload, field).map(|value| (*field, value)))
            .ok_or(ValidationError::MissingField { field: "tier" })?;

        self.catalog
            .resolve(&selector)
            .cloned()
            .ok_or(ValidationError::UnknownTier {
                field,
                value: selector,
            })
    }
}

fn honeypot_filled(object: &Map<String, Value>) -> bool {
    match object.get(HONEYPOT_FIELD) {
        None | Some(Value::Null) => false,
        Some(Value::String(value)) => !value.trim().is_empty(),
        Some(_) => true,
    }
}

fn text(payload: &Map<String, Value>, field: &str) -> Option<String> {
    let value = match payload.get(field)? {
        Value::String(value) => value.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn required_text(
    payload: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ValidationError> {
    text(payload, field).ok_or(ValidationError::MissingField { field })
}

fn optional_count(
    payload: &Map<String, Value>,
    field: &'static str,
    max: u32,
) -> Result<u32, ValidationError> {
    let invalid = ValidationError::InvalidCount { field, max };
    let parsed = match payload.get(field) {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(number)) => number.as_u64().ok_or(invalid.clone())?,
        Some(Value::String(raw)) if raw.trim().is_empty() => return Ok(0),
        Some(Value::String(raw)) => raw.trim().parse::<u64>().map_err(|_| invalid.clone())?,
        Some(_) => return Err(invalid),
    };

    u32::try_from(parsed)
        .ok()
        .filter(|count| *count <= max)
        .ok_or(invalid)
}
