use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crate::workflows::enrollment::domain::{ApplicantEmail, Application, PaymentStatus};
use crate::workflows::enrollment::gateway::{
    ChargeReceipt, ChargeRequest, ChargeStatus, GatewayError, PaymentGateway,
};
use crate::workflows::enrollment::notify::{
    DocumentRenderer, EmbeddedTemplates, HtmlInvoiceRenderer, InvoiceDocument, MailError, Mailer,
    NotificationDispatcher, NotificationSettings, OutboundEmail, RenderError, RenderedDocument,
    TemplateError, TemplateStore,
};
use crate::workflows::enrollment::store::{
    ApplicationUpdate, EnrollmentStore, InMemoryEnrollmentStore, StoreError,
};
use crate::workflows::enrollment::{
    enrollment_router, CorsPolicy, EnrollmentPaymentService, PricingPolicy, RetryPolicy,
    ServiceSettings, TierCatalog,
};
use crate::workflows::enrollment::domain::EnrollmentRecord;

pub(super) const APPLICANT: &str = "ada@example.com";
pub(super) const ALLOWED_ORIGIN: &str = "https://enroll.example.com";
pub(super) const SUPPORT_EMAIL: &str = "help@example.com";

pub(super) fn applicant() -> ApplicantEmail {
    ApplicantEmail::new(APPLICANT)
}

pub(super) fn application() -> Application {
    let mut application = Application::new(applicant(), "Ada Lovelace");
    application.company = Some("Analytical Engines".to_string());
    application
}

pub(super) fn paid_application() -> Application {
    let mut application = application();
    application.payment_status = PaymentStatus::Paid;
    application.payment_reference = Some("pi_earlier".to_string());
    application.paid_at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).single();
    application
}

pub(super) fn seeded_store(application: Application) -> Arc<InMemoryEnrollmentStore> {
    let store = Arc::new(InMemoryEnrollmentStore::default());
    store
        .insert_application(application)
        .expect("seed application");
    store
}

pub(super) fn card_payload(tier: &str, seats: u32) -> Value {
    json!({
        "applicant": APPLICANT,
        "name": "Ada Lovelace",
        "tier": tier,
        "additionalSeats": seats,
        "paymentMethod": "credit-card",
        "paymentMethodId": "pm_card_visa",
        "company": "Analytical Engines",
        "jobTitle": "Engineer",
        "phone": "555-0100",
        "country": "UK",
    })
}

pub(super) fn invoice_payload(tier: &str, seats: u32) -> Value {
    json!({
        "applicant": APPLICANT,
        "name": "Ada Lovelace",
        "tier": tier,
        "additionalSeats": seats.to_string(),
        "paymentMethod": "invoice",
        "company": "Analytical Engines",
        "jobTitle": "Engineer",
        "phone": "555-0100",
        "country": "UK",
    })
}

#[derive(Debug)]
pub(super) struct ScriptedGateway {
    outcome: Result<ChargeReceipt, GatewayError>,
    charges: Mutex<Vec<ChargeRequest>>,
}

impl ScriptedGateway {
    fn with_outcome(outcome: Result<ChargeReceipt, GatewayError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            charges: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn approving() -> Arc<Self> {
        Self::with_status(ChargeStatus::Succeeded)
    }

    pub(super) fn with_status(status: ChargeStatus) -> Arc<Self> {
        Self::with_outcome(Ok(ChargeReceipt {
            status,
            reference: "pi_test_001".to_string(),
        }))
    }

    pub(super) fn declining() -> Arc<Self> {
        Self::with_outcome(Err(GatewayError::Declined {
            code: Some("card_declined".to_string()),
            message: "Your card was declined.".to_string(),
        }))
    }

    pub(super) fn unavailable() -> Arc<Self> {
        Self::with_outcome(Err(GatewayError::Unavailable("timeout".to_string())))
    }

    pub(super) fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().expect("gateway mutex poisoned").clone()
    }
}

impl PaymentGateway for ScriptedGateway {
    fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        self.charges
            .lock()
            .expect("gateway mutex poisoned")
            .push(request.clone());
        self.outcome.clone()
    }
}

#[derive(Default)]
pub(super) struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingMailer {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct FailingMailer {
    pub(super) attempts: AtomicUsize,
}

impl Mailer for FailingMailer {
    fn send(&self, _email: &OutboundEmail) -> Result<(), MailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MailError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct FailingRenderer;

impl DocumentRenderer for FailingRenderer {
    fn render(&self, _document: &InvoiceDocument) -> Result<RenderedDocument, RenderError> {
        Err(RenderError::Backend("pdf engine crashed".to_string()))
    }
}

/// Template store with nothing in it.
pub(super) struct EmptyTemplates;

impl TemplateStore for EmptyTemplates {
    fn load(&self, name: &str) -> Result<String, TemplateError> {
        Err(TemplateError::Missing(name.to_string()))
    }
}

/// Wraps the in-memory store and injects failures into selected calls.
#[derive(Default)]
pub(super) struct FaultyStore {
    pub(super) inner: InMemoryEnrollmentStore,
    pub(super) failing_gets: AtomicUsize,
    pub(super) fail_conditional_update: bool,
    pub(super) fail_put: bool,
    pub(super) fail_counter: bool,
    /// Settles the application under this reference just before the next conditional update.
    pub(super) concurrent_payment: Mutex<Option<String>>,
    pub(super) conditional_updates: AtomicUsize,
    pub(super) puts: AtomicUsize,
}

impl FaultyStore {
    pub(super) fn with_application(application: Application) -> Self {
        let store = Self::default();
        store
            .inner
            .insert_application(application)
            .expect("seed application");
        store
    }
}

impl EnrollmentStore for FaultyStore {
    fn get(&self, applicant: &ApplicantEmail) -> Result<Option<Application>, StoreError> {
        let remaining = self.failing_gets.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_gets.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("throttled".to_string()));
        }
        self.inner.get(applicant)
    }

    fn put(&self, record: EnrollmentRecord) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put {
            return Err(StoreError::Unavailable("write capacity exceeded".to_string()));
        }
        self.inner.put(record)
    }

    fn conditional_update(
        &self,
        applicant: &ApplicantEmail,
        update: ApplicationUpdate,
        expected_prior: &[PaymentStatus],
    ) -> Result<Application, StoreError> {
        self.conditional_updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_conditional_update {
            return Err(StoreError::Unavailable("table offline".to_string()));
        }
        let racing = self.concurrent_payment.lock().expect("race mutex").take();
        if let Some(reference) = racing {
            self.inner.conditional_update(
                applicant,
                ApplicationUpdate::paid(2_025_000, reference, Utc::now()),
                expected_prior,
            )?;
        }
        self.inner.conditional_update(applicant, update, expected_prior)
    }

    fn increment_counter(&self, counter: &str) -> Result<u64, StoreError> {
        if self.fail_counter {
            return Err(StoreError::Unavailable("counter table offline".to_string()));
        }
        self.inner.increment_counter(counter)
    }
}

pub(super) fn dispatcher(mailer: Arc<dyn Mailer>) -> NotificationDispatcher {
    dispatcher_with(mailer, Arc::new(HtmlInvoiceRenderer), Arc::new(EmbeddedTemplates))
}

pub(super) fn dispatcher_with(
    mailer: Arc<dyn Mailer>,
    renderer: Arc<dyn DocumentRenderer>,
    templates: Arc<dyn TemplateStore>,
) -> NotificationDispatcher {
    NotificationDispatcher::new(
        mailer,
        renderer,
        templates,
        NotificationSettings {
            from: "enrollment@example.com".to_string(),
            support_email: SUPPORT_EMAIL.to_string(),
            retry: RetryPolicy::new(2, Duration::ZERO),
        },
    )
}

pub(super) fn service_settings() -> ServiceSettings {
    ServiceSettings {
        currency: "usd".to_string(),
        retry: RetryPolicy::new(3, Duration::ZERO),
    }
}

pub(super) fn build_service<S, G>(
    store: Arc<S>,
    gateway: Arc<G>,
    mailer: Arc<dyn Mailer>,
) -> EnrollmentPaymentService<S, G>
where
    S: EnrollmentStore + 'static,
    G: PaymentGateway + 'static,
{
    build_service_with(store, gateway, dispatcher(mailer))
}

pub(super) fn build_service_with<S, G>(
    store: Arc<S>,
    gateway: Arc<G>,
    notifier: NotificationDispatcher,
) -> EnrollmentPaymentService<S, G>
where
    S: EnrollmentStore + 'static,
    G: PaymentGateway + 'static,
{
    EnrollmentPaymentService::new(
        store,
        gateway,
        notifier,
        TierCatalog::fixed_dollar(),
        PricingPolicy::default(),
        service_settings(),
    )
}

pub(super) fn router_with_service<S, G>(service: EnrollmentPaymentService<S, G>) -> axum::Router
where
    S: EnrollmentStore + 'static,
    G: PaymentGateway + 'static,
{
    let cors = CorsPolicy::new(ALLOWED_ORIGIN).expect("valid origin");
    enrollment_router(Arc::new(service), cors)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
