use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use super::invoice::{DocumentRenderer, InvoiceDocument, InvoiceStamp, RenderError};
use super::mailer::{Attachment, MailError, Mailer, OutboundEmail};
use super::template::{
    escape_html, render_template, TemplateError, TemplateStore, INVOICE_REQUESTED_HTML,
    INVOICE_REQUESTED_TEXT, PAYMENT_CONFIRMED_HTML, PAYMENT_CONFIRMED_TEXT,
};
use crate::workflows::enrollment::domain::BASE_SEATS;
use crate::workflows::enrollment::intake::PaymentRequest;
use crate::workflows::enrollment::pricing::{format_cents, PricingQuote};
use crate::workflows::enrollment::retry::RetryPolicy;
use crate::workflows::enrollment::store::{EnrollmentStore, StoreError, INVOICE_COUNTER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PaymentConfirmed,
    InvoiceRequested,
}

impl NotificationKind {
    fn stamp(self) -> InvoiceStamp {
        match self {
            NotificationKind::PaymentConfirmed => InvoiceStamp::Paid,
            NotificationKind::InvoiceRequested => InvoiceStamp::DueUponReceipt,
        }
    }

    fn templates(self) -> (&'static str, &'static str) {
        match self {
            NotificationKind::PaymentConfirmed => (PAYMENT_CONFIRMED_HTML, PAYMENT_CONFIRMED_TEXT),
            NotificationKind::InvoiceRequested => (INVOICE_REQUESTED_HTML, INVOICE_REQUESTED_TEXT),
        }
    }

    fn subject(self, tier_label: &str) -> String {
        match self {
            NotificationKind::PaymentConfirmed => {
                format!("Payment confirmed: {tier_label} enrollment")
            }
            NotificationKind::InvoiceRequested => {
                format!("Invoice requested: {tier_label} enrollment")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    pub from: String,
    pub support_email: String,
    pub retry: RetryPolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("unable to allocate invoice number: {0}")]
    Counter(#[from] StoreError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Builds the invoice and sends exactly one e-mail per accepted request.
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    renderer: Arc<dyn DocumentRenderer>,
    templates: Arc<dyn TemplateStore>,
    settings: NotificationSettings,
}

impl NotificationDispatcher {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        renderer: Arc<dyn DocumentRenderer>,
        templates: Arc<dyn TemplateStore>,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            mailer,
            renderer,
            templates,
            settings,
        }
    }

    pub fn support_email(&self) -> &str {
        &self.settings.support_email
    }

    /// Returns the invoice number that was sent.
    pub fn dispatch<S>(
        &self,
        counters: &S,
        kind: NotificationKind,
        request: &PaymentRequest,
        quote: &PricingQuote,
        payment_reference: Option<&str>,
        issued_on: NaiveDate,
    ) -> Result<u64, NotificationError>
    where
        S: EnrollmentStore + ?Sized,
    {
        let number = counters.increment_counter(INVOICE_COUNTER)?;
        let document = InvoiceDocument::build(
            number,
            issued_on,
            kind.stamp(),
            request,
            quote,
            payment_reference,
        );
        let rendered = self.renderer.render(&document)?;

        let (html_name, text_name) = kind.templates();
        let values = self.template_values(&document, request, payment_reference);
        let html_values = values
            .iter()
            .map(|(key, value)| (*key, escape_html(value)))
            .collect::<BTreeMap<_, _>>();
        let html_body = render_template(&self.templates.load(html_name)?, &html_values);
        let text_body = render_template(&self.templates.load(text_name)?, &values);

        let email = OutboundEmail {
            from: self.settings.from.clone(),
            to: request.applicant.to_string(),
            subject: kind.subject(&request.tier.label),
            html_body,
            text_body,
            attachments: vec![Attachment {
                filename: rendered.filename,
                content_type: rendered.content_type,
                bytes: rendered.bytes,
            }],
        };

        self.settings
            .retry
            .run("mail.send", MailError::is_transient, || self.mailer.send(&email))?;

        info!(
            applicant = %request.applicant,
            invoice = %document.display_number(),
            stamp = document.stamp.label(),
            "enrollment notification sent"
        );
        Ok(number)
    }

    fn template_values(
        &self,
        document: &InvoiceDocument,
        request: &PaymentRequest,
        payment_reference: Option<&str>,
    ) -> BTreeMap<&'static str, String> {
        let mut values = BTreeMap::new();
        values.insert("name", request.name.clone());
        values.insert("company", request.company.clone());
        values.insert("tier", request.tier.label.clone());
        values.insert("total", format_cents(document.total_cents));
        values.insert("seats", (BASE_SEATS + request.additional_seats).to_string());
        values.insert("additional_seats", request.additional_seats.to_string());
        values.insert("support_hours", request.support_hours.to_string());
        values.insert("invoice_number", document.display_number());
        values.insert(
            "payment_reference",
            payment_reference.unwrap_or("n/a").to_string(),
        );
        values.insert("support_email", self.settings.support_email.clone());
        values
    }
}
