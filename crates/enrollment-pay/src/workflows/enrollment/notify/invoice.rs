use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::Serialize;

use super::template::escape_html;
use crate::workflows::enrollment::domain::BASE_SEATS;
use crate::workflows::enrollment::intake::PaymentRequest;
use crate::workflows::enrollment::pricing::{format_cents, PricingQuote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvoiceStamp {
    Paid,
    DueUponReceipt,
}

impl InvoiceStamp {
    pub const fn label(self) -> &'static str {
        match self {
            InvoiceStamp::Paid => "PAID",
            InvoiceStamp::DueUponReceipt => "DUE UPON RECEIPT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: u32,
    pub unit_cents: u64,
    pub amount_cents: u64,
}

/// Everything the renderer needs; fully determined by the request, quote, and number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceDocument {
    pub number: u64,
    pub issued_on: NaiveDate,
    pub stamp: InvoiceStamp,
    pub bill_to_name: String,
    pub bill_to_email: String,
    pub company: String,
    pub job_title: String,
    pub phone: String,
    pub country: String,
    pub total_seats: u32,
    pub lines: Vec<InvoiceLine>,
    pub total_cents: u64,
    pub payment_reference: Option<String>,
}

impl InvoiceDocument {
    pub fn build(
        number: u64,
        issued_on: NaiveDate,
        stamp: InvoiceStamp,
        request: &PaymentRequest,
        quote: &PricingQuote,
        payment_reference: Option<&str>,
    ) -> Self {
        let mut lines = vec![InvoiceLine {
            description: format!("{} program tier ({} seats included)", request.tier.label, BASE_SEATS),
            quantity: 1,
            unit_cents: quote.tier_base_cents,
            amount_cents: quote.tier_base_cents,
        }];
        if quote.additional_seats > 0 {
            lines.push(InvoiceLine {
                description: "Additional seats".to_string(),
                quantity: quote.additional_seats,
                unit_cents: quote.per_seat_cents,
                amount_cents: quote.seat_surcharge_cents,
            });
        }
        if quote.support_hours > 0 {
            lines.push(InvoiceLine {
                description: "Advisory support hours".to_string(),
                quantity: quote.support_hours,
                unit_cents: quote.hourly_rate_cents,
                amount_cents: quote.support_surcharge_cents,
            });
        }

        Self {
            number,
            issued_on,
            stamp,
            bill_to_name: request.name.clone(),
            bill_to_email: request.applicant.to_string(),
            company: request.company.clone(),
            job_title: request.job_title.clone(),
            phone: request.phone.clone(),
            country: request.country.clone(),
            total_seats: BASE_SEATS + quote.additional_seats,
            lines,
            total_cents: quote.total_cents,
            payment_reference: payment_reference.map(str::to_string),
        }
    }

    pub fn display_number(&self) -> String {
        format_invoice_number(self.number)
    }
}

pub fn format_invoice_number(number: u64) -> String {
    format!("INV-{number:06}")
}

/// Rendered artifact ready to attach to an e-mail.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub filename: String,
    pub content_type: mime::Mime,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("document renderer failed: {0}")]
    Backend(String),
}

/// External document renderer; a pure function of its input.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &InvoiceDocument) -> Result<RenderedDocument, RenderError>;
}

/// Minimal self-contained HTML invoice.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlInvoiceRenderer;

impl DocumentRenderer for HtmlInvoiceRenderer {
    fn render(&self, document: &InvoiceDocument) -> Result<RenderedDocument, RenderError> {
        let html = render_invoice_html(document)
            .map_err(|err| RenderError::Backend(err.to_string()))?;
        Ok(RenderedDocument {
            filename: format!("{}.html", document.display_number()),
            content_type: mime::TEXT_HTML_UTF_8,
            bytes: html.into_bytes(),
        })
    }
}

fn render_invoice_html(document: &InvoiceDocument) -> Result<String, std::fmt::Error> {
    let mut html = String::new();
    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(
        html,
        "<html><head><meta charset=\"utf-8\"><title>Invoice {}</title></head><body>",
        document.display_number()
    )?;
    writeln!(html, "<h1>Invoice {}</h1>", document.display_number())?;
    writeln!(html, "<p class=\"stamp\">{}</p>", document.stamp.label())?;
    writeln!(html, "<p>Issued {}</p>", document.issued_on.format("%B %-d, %Y"))?;

    writeln!(html, "<h2>Bill to</h2><p>")?;
    writeln!(html, "{}<br>", escape_html(&document.bill_to_name))?;
    writeln!(
        html,
        "{}, {}<br>",
        escape_html(&document.job_title),
        escape_html(&document.company)
    )?;
    writeln!(html, "{}<br>", escape_html(&document.bill_to_email))?;
    writeln!(
        html,
        "{} &middot; {}</p>",
        escape_html(&document.phone),
        escape_html(&document.country)
    )?;

    writeln!(
        html,
        "<table><thead><tr><th>Item</th><th>Qty</th><th>Unit</th><th>Amount</th></tr></thead><tbody>"
    )?;
    for line in &document.lines {
        writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&line.description),
            line.quantity,
            format_cents(line.unit_cents),
            format_cents(line.amount_cents)
        )?;
    }
    writeln!(
        html,
        "</tbody><tfoot><tr><td colspan=\"3\">Total ({} seats)</td><td>{}</td></tr></tfoot></table>",
        document.total_seats,
        format_cents(document.total_cents)
    )?;

    if let Some(reference) = &document.payment_reference {
        writeln!(html, "<p>Payment reference: {}</p>", escape_html(reference))?;
    }
    writeln!(html, "</body></html>")?;
    Ok(html)
}
