use std::collections::HashMap;
use std::io::Read;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::domain::{
    ApplicantEmail, Application, EnrollmentRecord, PaymentMethod, PaymentStatus,
};

/// Shared counter used for invoice numbering.
pub const INVOICE_COUNTER: &str = "invoice-number";

/// States from which an application may still be settled.
pub const SETTLEABLE: [PaymentStatus; 2] = [PaymentStatus::Unset, PaymentStatus::Pending];

/// Attribute set written by a conditional application update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationUpdate {
    pub status: PaymentStatus,
    pub amount_cents: u64,
    pub method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub invoice_requested_at: Option<DateTime<Utc>>,
}

impl ApplicationUpdate {
    pub fn paid(amount_cents: u64, payment_reference: String, at: DateTime<Utc>) -> Self {
        Self {
            status: PaymentStatus::Paid,
            amount_cents,
            method: PaymentMethod::CreditCard,
            payment_reference: Some(payment_reference),
            paid_at: Some(at),
            invoice_requested_at: None,
        }
    }

    pub fn invoice_requested(amount_cents: u64, at: DateTime<Utc>) -> Self {
        Self {
            status: PaymentStatus::Pending,
            amount_cents,
            method: PaymentMethod::Invoice,
            payment_reference: None,
            paid_at: None,
            invoice_requested_at: Some(at),
        }
    }

    fn apply(&self, application: &mut Application) {
        application.payment_status = self.status;
        application.payment_amount_cents = Some(self.amount_cents);
        application.payment_method = Some(self.method);
        if let Some(reference) = &self.payment_reference {
            application.payment_reference = Some(reference.clone());
        }
        if let Some(paid_at) = self.paid_at {
            application.paid_at = Some(paid_at);
        }
        if let Some(requested_at) = self.invoice_requested_at {
            application.invoice_requested_at = Some(requested_at);
        }
    }
}

/// Key-value persistence for applications, enrollment records, and counters.
///
/// `conditional_update` must be atomic with respect to the expected prior state; it is
/// the only guard against two concurrent requests settling the same application.
pub trait EnrollmentStore: Send + Sync {
    fn get(&self, applicant: &ApplicantEmail) -> Result<Option<Application>, StoreError>;
    fn put(&self, record: EnrollmentRecord) -> Result<(), StoreError>;
    fn conditional_update(
        &self,
        applicant: &ApplicantEmail,
        update: ApplicationUpdate,
        expected_prior: &[PaymentStatus],
    ) -> Result<Application, StoreError>;
    fn increment_counter(&self, counter: &str) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("conditional update rejected: application is {}", current.label())]
    ConditionFailed { current: PaymentStatus },
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Only backend outages are worth retrying; condition and lookup failures are answers.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("malformed application seed row: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Process-local store used by the reference service and tests.
#[derive(Debug, Default)]
pub struct InMemoryEnrollmentStore {
    applications: Mutex<HashMap<ApplicantEmail, Application>>,
    enrollments: Mutex<HashMap<ApplicantEmail, EnrollmentRecord>>,
    counters: Mutex<HashMap<String, u64>>,
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable("store mutex poisoned".to_string())
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Deserialize)]
struct SeedRow {
    applicant: String,
    name: String,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    job_title: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    payment_status: Option<PaymentStatus>,
}

impl InMemoryEnrollmentStore {
    pub fn insert_application(&self, application: Application) -> Result<(), StoreError> {
        let mut guard = self.applications.lock().map_err(poisoned)?;
        guard.insert(application.applicant.clone(), application);
        Ok(())
    }

    /// Load `applicant,name,company,job_title,phone,country,tier,payment_status` rows.
    pub fn seed_from_csv<R: Read>(&self, reader: R) -> Result<usize, SeedError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut loaded = 0;
        for row in csv_reader.deserialize::<SeedRow>() {
            let row = row?;
            let mut application = Application::new(ApplicantEmail::new(&row.applicant), row.name);
            application.company = row.company.filter(|value| !value.is_empty());
            application.job_title = row.job_title.filter(|value| !value.is_empty());
            application.phone = row.phone.filter(|value| !value.is_empty());
            application.country = row.country.filter(|value| !value.is_empty());
            application.tier = row.tier.filter(|value| !value.is_empty());
            application.payment_status = row.payment_status.unwrap_or_default();
            self.insert_application(application)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn application(&self, applicant: &ApplicantEmail) -> Option<Application> {
        lock_or_recover(&self.applications).get(applicant).cloned()
    }

    pub fn enrollment(&self, applicant: &ApplicantEmail) -> Option<EnrollmentRecord> {
        lock_or_recover(&self.enrollments).get(applicant).cloned()
    }

    pub fn enrollment_count(&self) -> usize {
        lock_or_recover(&self.enrollments).len()
    }
}

impl EnrollmentStore for InMemoryEnrollmentStore {
    fn get(&self, applicant: &ApplicantEmail) -> Result<Option<Application>, StoreError> {
        let guard = self.applications.lock().map_err(poisoned)?;
        Ok(guard.get(applicant).cloned())
    }

    fn put(&self, record: EnrollmentRecord) -> Result<(), StoreError> {
        let mut guard = self.enrollments.lock().map_err(poisoned)?;
        guard.insert(record.applicant.clone(), record);
        Ok(())
    }

    fn conditional_update(
        &self,
        applicant: &ApplicantEmail,
        update: ApplicationUpdate,
        expected_prior: &[PaymentStatus],
    ) -> Result<Application, StoreError> {
        let mut guard = self.applications.lock().map_err(poisoned)?;
        let application = guard.get_mut(applicant).ok_or(StoreError::NotFound)?;
        if !expected_prior.contains(&application.payment_status) {
            return Err(StoreError::ConditionFailed {
                current: application.payment_status,
            });
        }
        update.apply(application);
        Ok(application.clone())
    }

    fn increment_counter(&self, counter: &str) -> Result<u64, StoreError> {
        let mut guard = self.counters.lock().map_err(poisoned)?;
        let value = guard.entry(counter.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}
