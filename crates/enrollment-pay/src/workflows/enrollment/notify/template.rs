use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub const PAYMENT_CONFIRMED_HTML: &str = "payment-confirmed.html";
pub const PAYMENT_CONFIRMED_TEXT: &str = "payment-confirmed.txt";
pub const INVOICE_REQUESTED_HTML: &str = "invoice-requested.html";
pub const INVOICE_REQUESTED_TEXT: &str = "invoice-requested.txt";

const EMBEDDED: [(&str, &str); 4] = [
    (
        PAYMENT_CONFIRMED_HTML,
        "<p>Hi {{name}},</p>\n\
         <p>We received your payment of <strong>{{total}}</strong> for the {{tier}} program. \
         Your enrollment is confirmed for {{seats}} participants.</p>\n\
         <p>Invoice {{invoice_number}} is attached for your records \
         (payment reference {{payment_reference}}).</p>\n\
         <p>Questions? Reach us at {{support_email}}.</p>\n",
    ),
    (
        PAYMENT_CONFIRMED_TEXT,
        "Hi {{name}},\n\n\
         We received your payment of {{total}} for the {{tier}} program. \
         Your enrollment is confirmed for {{seats}} participants.\n\n\
         Invoice {{invoice_number}} is attached for your records \
         (payment reference {{payment_reference}}).\n\n\
         Questions? Reach us at {{support_email}}.\n",
    ),
    (
        INVOICE_REQUESTED_HTML,
        "<p>Hi {{name}},</p>\n\
         <p>Thanks for choosing the {{tier}} program for {{company}}. \
         Invoice {{invoice_number}} for <strong>{{total}}</strong> is attached and is due upon receipt.</p>\n\
         <p>Your {{seats}} seats are reserved; enrollment completes once payment arrives.</p>\n\
         <p>Questions? Reach us at {{support_email}}.</p>\n",
    ),
    (
        INVOICE_REQUESTED_TEXT,
        "Hi {{name}},\n\n\
         Thanks for choosing the {{tier}} program for {{company}}. \
         Invoice {{invoice_number}} for {{total}} is attached and is due upon receipt.\n\n\
         Your {{seats}} seats are reserved; enrollment completes once payment arrives.\n\n\
         Questions? Reach us at {{support_email}}.\n",
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    Missing(String),
    #[error("unable to read template '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Source of e-mail bodies with `{{placeholder}}` markers.
pub trait TemplateStore: Send + Sync {
    fn load(&self, name: &str) -> Result<String, TemplateError>;
}

/// Templates compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedTemplates;

impl TemplateStore for EmbeddedTemplates {
    fn load(&self, name: &str) -> Result<String, TemplateError> {
        EMBEDDED
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, body)| (*body).to_string())
            .ok_or_else(|| TemplateError::Missing(name.to_string()))
    }
}

/// Templates read from `<root>/<name>` on every load so edits apply without a restart.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    root: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateStore for DirectoryTemplates {
    fn load(&self, name: &str) -> Result<String, TemplateError> {
        let path = self.root.join(name);
        fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                TemplateError::Missing(name.to_string())
            } else {
                TemplateError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        })
    }
}

/// Literal `{{key}}` substitution in one pass over the template. Unknown placeholders are
/// left untouched and substituted values are never scanned again.
pub fn render_template(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        rendered.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            rest = &rest[open..];
            break;
        };
        match values.get(&after_open[..close]) {
            Some(value) => {
                rendered.push_str(value);
                rest = &after_open[close + 2..];
            }
            None => {
                rendered.push_str("{{");
                rest = after_open;
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
