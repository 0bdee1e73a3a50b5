use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info, warn};

use super::catalog::TierCatalog;
use super::domain::{
    ApplicantEmail, Application, EnrollmentPaymentStatus, EnrollmentRecord, PaymentMethod,
    BASE_SEATS,
};
use super::gateway::{ChargeRequest, ChargeStatus, GatewayError, PaymentGateway};
use super::intake::{IntakeOutcome, PaymentRequest, RequestValidator, ValidationError};
use super::notify::{NotificationDispatcher, NotificationKind};
use super::pricing::{PricingError, PricingPolicy, PricingQuote};
use super::retry::RetryPolicy;
use super::store::{ApplicationUpdate, EnrollmentStore, StoreError, SETTLEABLE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub currency: String,
    pub retry: RetryPolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    /// Honeypot submission; nothing was read or written.
    Ignored,
    Enrolled {
        applicant: ApplicantEmail,
        payment_reference: String,
        quote: PricingQuote,
        invoice_number: Option<u64>,
    },
    InvoiceRequested {
        applicant: ApplicantEmail,
        quote: PricingQuote,
        invoice_number: Option<u64>,
    },
}

/// Processor refusal surfaced to the applicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDecline {
    pub message: String,
    pub code: Option<String>,
    pub requires_action: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DependencyFailure {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no application found for {applicant}")]
    NotFound { applicant: ApplicantEmail },
    #[error("application for {applicant} has already been paid")]
    AlreadyPaid {
        applicant: ApplicantEmail,
        enrolled_at: Option<DateTime<Utc>>,
    },
    #[error("payment declined: {}", .0.message)]
    Declined(PaymentDecline),
    #[error("{operation} failed: {source}")]
    Dependency {
        operation: &'static str,
        #[source]
        source: DependencyFailure,
    },
    /// Configured prices cannot produce a representable total.
    #[error("unable to price submission: {0}")]
    Pricing(#[source] PricingError),
    /// Money moved but the application or enrollment record was not written.
    #[error("payment {payment_reference} for {applicant} captured without a matching record: {source}")]
    ReconciliationRequired {
        applicant: ApplicantEmail,
        payment_reference: String,
        amount_cents: u64,
        #[source]
        source: StoreError,
    },
}

fn dependency(operation: &'static str, source: impl Into<DependencyFailure>) -> EnrollmentError {
    EnrollmentError::Dependency {
        operation,
        source: source.into(),
    }
}

fn quote_rejected(err: PricingError) -> EnrollmentError {
    let invalid = match err {
        PricingError::SeatsOutOfRange { max, .. } => ValidationError::InvalidCount {
            field: "additionalSeats",
            max,
        },
        PricingError::HoursOutOfRange { max, .. } => ValidationError::InvalidCount {
            field: "addonSupportHours",
            max,
        },
        overflow @ PricingError::Overflow { .. } => return EnrollmentError::Pricing(overflow),
    };
    EnrollmentError::Validation(invalid)
}

/// Validates, prices, and settles payment submissions for existing applications.
pub struct EnrollmentPaymentService<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    notifier: NotificationDispatcher,
    catalog: TierCatalog,
    pricing: PricingPolicy,
    settings: ServiceSettings,
}

impl<S, G> EnrollmentPaymentService<S, G>
where
    S: EnrollmentStore + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        notifier: NotificationDispatcher,
        catalog: TierCatalog,
        pricing: PricingPolicy,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            catalog,
            pricing,
            settings,
        }
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    pub fn support_email(&self) -> &str {
        self.notifier.support_email()
    }

    /// Process one payment or invoice submission start to finish.
    pub fn submit(&self, payload: &Value) -> Result<EnrollmentOutcome, EnrollmentError> {
        let request = match RequestValidator::new(&self.catalog, &self.pricing).validate(payload)? {
            IntakeOutcome::Spam => {
                info!("honeypot field filled; submission ignored");
                return Ok(EnrollmentOutcome::Ignored);
            }
            IntakeOutcome::Accepted(request) => request,
        };

        let quote = self
            .pricing
            .quote(&request.tier, request.additional_seats, request.support_hours)
            .map_err(quote_rejected)?;

        let application = self
            .settings
            .retry
            .run("store.get", StoreError::is_transient, || {
                self.store.get(&request.applicant)
            })
            .map_err(|source| dependency("store.get", source))?
            .ok_or_else(|| EnrollmentError::NotFound {
                applicant: request.applicant.clone(),
            })?;

        if application.payment_status.is_terminal() {
            return Err(already_paid(&application));
        }

        info!(
            applicant = %request.applicant,
            tier = %request.tier.key,
            method = request.payment_method.label(),
            total_cents = quote.total_cents,
            "payment submission accepted"
        );

        match request.payment_method {
            PaymentMethod::CreditCard => self.capture(request, quote),
            PaymentMethod::Invoice => self.request_invoice(request, quote),
        }
    }

    fn capture(
        &self,
        request: PaymentRequest,
        quote: PricingQuote,
    ) -> Result<EnrollmentOutcome, EnrollmentError> {
        let token = request
            .payment_token
            .clone()
            .ok_or(ValidationError::MissingField {
                field: "paymentMethodId",
            })?;

        let charge = ChargeRequest {
            amount_cents: quote.total_cents,
            currency: self.settings.currency.clone(),
            idempotency_key: format!(
                "enroll:{}:{}:{}",
                request.applicant, token, quote.total_cents
            ),
            payment_token: token,
            metadata: charge_metadata(&request),
        };

        // Single attempt: a retried capture can double-charge.
        let receipt = match self.gateway.charge(&charge) {
            Ok(receipt) => receipt,
            Err(GatewayError::Declined { code, message }) => {
                info!(applicant = %request.applicant, ?code, "card declined");
                return Err(EnrollmentError::Declined(PaymentDecline {
                    message,
                    code,
                    requires_action: false,
                }));
            }
            Err(err @ GatewayError::Unavailable(_)) => {
                return Err(dependency("gateway.charge", err));
            }
        };

        match receipt.status {
            ChargeStatus::Succeeded => {}
            ChargeStatus::RequiresAction => {
                return Err(EnrollmentError::Declined(PaymentDecline {
                    message: "Your card requires additional authentication. Please complete \
                              verification with your bank and try again."
                        .to_string(),
                    code: Some(ChargeStatus::RequiresAction.label().to_string()),
                    requires_action: true,
                }));
            }
            other => {
                return Err(EnrollmentError::Declined(PaymentDecline {
                    message: format!("Payment was not completed (status: {}).", other.label()),
                    code: Some(other.label().to_string()),
                    requires_action: false,
                }));
            }
        }

        let now = Utc::now();
        let update = ApplicationUpdate::paid(quote.total_cents, receipt.reference.clone(), now);
        match self
            .store
            .conditional_update(&request.applicant, update, &SETTLEABLE)
        {
            Ok(_) => {}
            Err(source @ StoreError::ConditionFailed { .. }) => {
                // A concurrent submission with the same idempotency key already recorded
                // this exact capture; the processor did not take the money twice.
                if let Some(settled) = self.settled_by(&request.applicant, &receipt.reference) {
                    return Err(already_paid(&settled));
                }
                return Err(reconciliation(&request, &receipt.reference, &quote, source));
            }
            Err(source) => {
                return Err(reconciliation(&request, &receipt.reference, &quote, source));
            }
        }

        let record = enrollment_record(
            &request,
            &quote,
            EnrollmentPaymentStatus::Complete,
            quote.total_cents,
            now,
        );
        if let Err(source) = self
            .settings
            .retry
            .run("store.put", StoreError::is_transient, || {
                self.store.put(record.clone())
            })
        {
            return Err(reconciliation(&request, &receipt.reference, &quote, source));
        }

        info!(
            applicant = %request.applicant,
            payment_reference = %receipt.reference,
            amount_cents = quote.total_cents,
            "payment captured and enrollment recorded"
        );

        let invoice_number = self.notify(
            NotificationKind::PaymentConfirmed,
            &request,
            &quote,
            Some(&receipt.reference),
            now,
        );

        Ok(EnrollmentOutcome::Enrolled {
            applicant: request.applicant,
            payment_reference: receipt.reference,
            quote,
            invoice_number,
        })
    }

    fn request_invoice(
        &self,
        request: PaymentRequest,
        quote: PricingQuote,
    ) -> Result<EnrollmentOutcome, EnrollmentError> {
        let now = Utc::now();
        let update = ApplicationUpdate::invoice_requested(quote.total_cents, now);
        match self
            .store
            .conditional_update(&request.applicant, update, &SETTLEABLE)
        {
            Ok(_) => {}
            Err(StoreError::ConditionFailed { .. }) => {
                let enrolled_at = self
                    .store
                    .get(&request.applicant)
                    .ok()
                    .flatten()
                    .and_then(|application| application.paid_at);
                return Err(EnrollmentError::AlreadyPaid {
                    applicant: request.applicant,
                    enrolled_at,
                });
            }
            Err(StoreError::NotFound) => {
                return Err(EnrollmentError::NotFound {
                    applicant: request.applicant,
                });
            }
            Err(source) => return Err(dependency("store.conditional_update", source)),
        }

        let record = enrollment_record(&request, &quote, EnrollmentPaymentStatus::Pending, 0, now);
        self.settings
            .retry
            .run("store.put", StoreError::is_transient, || {
                self.store.put(record.clone())
            })
            .map_err(|source| dependency("store.put", source))?;

        info!(
            applicant = %request.applicant,
            amount_cents = quote.total_cents,
            "invoice requested and enrollment recorded as pending"
        );

        let invoice_number = self.notify(
            NotificationKind::InvoiceRequested,
            &request,
            &quote,
            None,
            now,
        );

        Ok(EnrollmentOutcome::InvoiceRequested {
            applicant: request.applicant,
            quote,
            invoice_number,
        })
    }

    /// The stored application, if it is already paid under `payment_reference`.
    fn settled_by(&self, applicant: &ApplicantEmail, payment_reference: &str) -> Option<Application> {
        self.store
            .get(applicant)
            .ok()
            .flatten()
            .filter(|application| {
                application.payment_status.is_terminal()
                    && application.payment_reference.as_deref() == Some(payment_reference)
            })
    }

    /// Mail problems never undo the transition; they are logged for follow-up.
    fn notify(
        &self,
        kind: NotificationKind,
        request: &PaymentRequest,
        quote: &PricingQuote,
        payment_reference: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<u64> {
        match self.notifier.dispatch(
            self.store.as_ref(),
            kind,
            request,
            quote,
            payment_reference,
            now.date_naive(),
        ) {
            Ok(number) => Some(number),
            Err(err) => {
                warn!(
                    applicant = %request.applicant,
                    ?kind,
                    error = %err,
                    follow_up = true,
                    "enrollment notification failed after state change"
                );
                None
            }
        }
    }
}

fn already_paid(application: &Application) -> EnrollmentError {
    EnrollmentError::AlreadyPaid {
        applicant: application.applicant.clone(),
        enrolled_at: application.paid_at,
    }
}

fn reconciliation(
    request: &PaymentRequest,
    payment_reference: &str,
    quote: &PricingQuote,
    source: StoreError,
) -> EnrollmentError {
    error!(
        reconciliation_required = true,
        applicant = %request.applicant,
        payment_reference,
        amount_cents = quote.total_cents,
        error = %source,
        "payment captured but enrollment state was not written"
    );
    EnrollmentError::ReconciliationRequired {
        applicant: request.applicant.clone(),
        payment_reference: payment_reference.to_string(),
        amount_cents: quote.total_cents,
        source,
    }
}

fn charge_metadata(request: &PaymentRequest) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("applicant".to_string(), request.applicant.to_string());
    metadata.insert("tier".to_string(), request.tier.key.clone());
    metadata.insert(
        "additional_seats".to_string(),
        request.additional_seats.to_string(),
    );
    metadata.insert(
        "support_hours".to_string(),
        request.support_hours.to_string(),
    );
    metadata
}

fn enrollment_record(
    request: &PaymentRequest,
    quote: &PricingQuote,
    payment_status: EnrollmentPaymentStatus,
    amount_paid_cents: u64,
    enrolled_at: DateTime<Utc>,
) -> EnrollmentRecord {
    EnrollmentRecord {
        applicant: request.applicant.clone(),
        name: request.name.clone(),
        company: request.company.clone(),
        job_title: request.job_title.clone(),
        phone: request.phone.clone(),
        country: request.country.clone(),
        tier_key: request.tier.key.clone(),
        tier_label: request.tier.label.clone(),
        additional_seats: request.additional_seats,
        total_seats: BASE_SEATS + request.additional_seats,
        support_hours: request.support_hours,
        amount_due_cents: quote.total_cents,
        amount_paid_cents,
        payment_method: request.payment_method,
        payment_status,
        enrolled_at,
    }
}
