//! Confirmation e-mail with an attached invoice, sent after a successful transition.

pub mod dispatcher;
pub mod invoice;
pub mod mailer;
pub mod template;

pub use dispatcher::{NotificationDispatcher, NotificationError, NotificationKind, NotificationSettings};
pub use invoice::{
    DocumentRenderer, HtmlInvoiceRenderer, InvoiceDocument, InvoiceLine, InvoiceStamp,
    RenderError, RenderedDocument,
};
pub use mailer::{Attachment, MailError, Mailer, OutboundEmail};
pub use template::{
    render_template, DirectoryTemplates, EmbeddedTemplates, TemplateError, TemplateStore,
};
