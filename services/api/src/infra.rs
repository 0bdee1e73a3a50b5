use enrollment_pay::config::EnrollmentSettings;
use enrollment_pay::error::AppError;
use enrollment_pay::workflows::enrollment::notify::{
    DirectoryTemplates, EmbeddedTemplates, HtmlInvoiceRenderer, MailError, Mailer,
    NotificationDispatcher, NotificationSettings, OutboundEmail, TemplateStore,
};
use enrollment_pay::workflows::enrollment::{
    ChargeReceipt, ChargeRequest, ChargeStatus, EnrollmentPaymentService, GatewayError,
    InMemoryEnrollmentStore, PaymentGateway, ServiceSettings, TierCatalog,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::fs::File;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

pub(crate) type ReferenceService = EnrollmentPaymentService<InMemoryEnrollmentStore, SandboxGateway>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Offline stand-in for the card processor, keyed on processor test tokens.
///
/// Replays the first receipt for a repeated idempotency key, like the real processor.
#[derive(Debug, Default)]
pub(crate) struct SandboxGateway {
    receipts: Mutex<HashMap<String, ChargeReceipt>>,
}

impl SandboxGateway {
    pub(crate) const APPROVED: &'static str = "pm_card_visa";
    pub(crate) const DECLINED: &'static str = "pm_card_chargeDeclined";
    pub(crate) const AUTHENTICATION_REQUIRED: &'static str = "pm_card_authenticationRequired";
}

impl PaymentGateway for SandboxGateway {
    fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        let mut receipts = self
            .receipts
            .lock()
            .map_err(|_| GatewayError::Unavailable("sandbox ledger poisoned".to_string()))?;
        if let Some(existing) = receipts.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let status = match request.payment_token.as_str() {
            Self::APPROVED => ChargeStatus::Succeeded,
            Self::AUTHENTICATION_REQUIRED => ChargeStatus::RequiresAction,
            Self::DECLINED => {
                return Err(GatewayError::Declined {
                    code: Some("card_declined".to_string()),
                    message: "Your card was declined.".to_string(),
                })
            }
            other => {
                return Err(GatewayError::Declined {
                    code: Some("resource_missing".to_string()),
                    message: format!("No such payment method: '{other}'"),
                })
            }
        };

        let receipt = ChargeReceipt {
            status,
            reference: format!("pi_sandbox_{:06}", receipts.len() + 1),
        };
        receipts.insert(request.idempotency_key.clone(), receipt.clone());
        Ok(receipt)
    }
}

/// Writes outbound mail to the log instead of a transport.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingMailer;

impl Mailer for TracingMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        let attachments = email
            .attachments
            .iter()
            .map(|attachment| attachment.filename.as_str())
            .collect::<Vec<_>>();
        info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            ?attachments,
            "outbound email"
        );
        Ok(())
    }
}

pub(crate) fn build_enrollment_service(
    settings: &EnrollmentSettings,
) -> Result<ReferenceService, AppError> {
    let catalog = TierCatalog::load(&settings.catalog)?;

    let store = InMemoryEnrollmentStore::default();
    if let Some(path) = &settings.seed_applications {
        let loaded = store.seed_from_csv(File::open(path)?)?;
        info!(loaded, path = %path.display(), "seeded applications");
    }

    let templates: Arc<dyn TemplateStore> = match &settings.template_dir {
        Some(dir) => Arc::new(DirectoryTemplates::new(dir.clone())),
        None => Arc::new(EmbeddedTemplates),
    };
    let retry = settings.retry_policy();
    let dispatcher = NotificationDispatcher::new(
        Arc::new(TracingMailer),
        Arc::new(HtmlInvoiceRenderer),
        templates,
        NotificationSettings {
            from: settings.mail_from.clone(),
            support_email: settings.support_email.clone(),
            retry,
        },
    );

    Ok(EnrollmentPaymentService::new(
        Arc::new(store),
        Arc::new(SandboxGateway::default()),
        dispatcher,
        catalog,
        settings.pricing_policy(),
        ServiceSettings {
            currency: settings.currency.clone(),
            retry,
        },
    ))
}
