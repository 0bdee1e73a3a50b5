//! Payment intake for training-program enrollment.
//!
//! A submission is validated, priced from the tier catalog, and settled either by capturing a
//! card through the payment gateway or by recording an invoice request. The application's
//! move into `paid` is guarded by a conditional store write so it happens at most once.

pub mod catalog;
pub mod domain;
pub mod gateway;
pub mod intake;
pub mod notify;
pub mod pricing;
pub mod retry;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, Tier, TierCatalog};
pub use domain::{
    ApplicantEmail, Application, EnrollmentPaymentStatus, EnrollmentRecord, PaymentMethod,
    PaymentStatus, BASE_SEATS,
};
pub use gateway::{ChargeReceipt, ChargeRequest, ChargeStatus, GatewayError, PaymentGateway};
pub use intake::{IntakeOutcome, PaymentRequest, RequestValidator, ValidationError};
pub use pricing::{format_cents, PricingError, PricingPolicy, PricingQuote};
pub use retry::RetryPolicy;
pub use router::{enrollment_router, CorsPolicy, PAYMENT_ROUTE};
pub use service::{
    DependencyFailure, EnrollmentError, EnrollmentOutcome, EnrollmentPaymentService,
    PaymentDecline, ServiceSettings,
};
pub use store::{
    ApplicationUpdate, EnrollmentStore, InMemoryEnrollmentStore, SeedError, StoreError,
    INVOICE_COUNTER, SETTLEABLE,
};
