use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seats every tier includes before add-ons.
pub const BASE_SEATS: u32 = 10;

/// Applicant e-mail, the unique key of an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicantEmail(pub String);

impl ApplicantEmail {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicantEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment lifecycle of an application: `unset -> pending -> paid`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unset,
    Pending,
    Paid,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Unset => "unset",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

/// How the applicant chose to settle the program fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "credit-card")]
    CreditCard,
    #[serde(rename = "invoice")]
    Invoice,
}

impl PaymentMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "credit-card" => Some(Self::CreditCard),
            "invoice" => Some(Self::Invoice),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit-card",
            PaymentMethod::Invoice => "invoice",
        }
    }
}

/// Application created by the submission flow and settled by the payment endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub applicant: ApplicantEmail,
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_amount_cents: Option<u64>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub invoice_requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Application {
    pub fn new(applicant: ApplicantEmail, name: impl Into<String>) -> Self {
        Self {
            applicant,
            name: name.into(),
            company: None,
            job_title: None,
            phone: None,
            country: None,
            tier: None,
            payment_status: PaymentStatus::Unset,
            payment_amount_cents: None,
            payment_method: None,
            payment_reference: None,
            invoice_requested_at: None,
            paid_at: None,
        }
    }
}

/// Settlement state of an enrollment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentPaymentStatus {
    Pending,
    Complete,
}

/// Student record written once a payment or invoice request is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub applicant: ApplicantEmail,
    pub name: String,
    pub company: String,
    pub job_title: String,
    pub phone: String,
    pub country: String,
    pub tier_key: String,
    pub tier_label: String,
    pub additional_seats: u32,
    pub total_seats: u32,
    pub support_hours: u32,
    pub amount_due_cents: u64,
    pub amount_paid_cents: u64,
    pub payment_method: PaymentMethod,
    pub payment_status: EnrollmentPaymentStatus,
    pub enrolled_at: DateTime<Utc>,
}
