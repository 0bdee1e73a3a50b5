use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{
            InvalidHeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::error;

use super::gateway::PaymentGateway;
use super::service::{EnrollmentError, EnrollmentOutcome, EnrollmentPaymentService};
use super::store::EnrollmentStore;

pub const PAYMENT_ROUTE: &str = "/api/v1/enrollment/payment";

const GENERIC_FAILURE: &str = "An unexpected error occurred while processing your payment. \
                               Our team has been notified; please try again later.";

/// Fixed CORS headers attached to every response of the payment route.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origin: HeaderValue,
}

impl CorsPolicy {
    pub fn new(allowed_origin: &str) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            allow_origin: HeaderValue::from_str(allowed_origin.trim())?,
        })
    }

    fn headers(&self) -> [(HeaderName, HeaderValue); 3] {
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone()),
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("POST, OPTIONS"),
            ),
            (
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            ),
        ]
    }

    fn respond(&self, status: StatusCode, body: Value) -> Response {
        (status, self.headers(), Json(body)).into_response()
    }
}

pub(crate) struct RouteState<S, G> {
    pub(crate) service: Arc<EnrollmentPaymentService<S, G>>,
    pub(crate) cors: CorsPolicy,
}

impl<S, G> Clone for RouteState<S, G> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cors: self.cors.clone(),
        }
    }
}

/// Router exposing the payment intake endpoint.
pub fn enrollment_router<S, G>(
    service: Arc<EnrollmentPaymentService<S, G>>,
    cors: CorsPolicy,
) -> Router
where
    S: EnrollmentStore + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route(
            PAYMENT_ROUTE,
            post(payment_handler::<S, G>).options(preflight_handler::<S, G>),
        )
        .with_state(RouteState { service, cors })
}

pub(crate) async fn preflight_handler<S, G>(State(state): State<RouteState<S, G>>) -> Response
where
    S: EnrollmentStore + 'static,
    G: PaymentGateway + 'static,
{
    (StatusCode::NO_CONTENT, state.cors.headers()).into_response()
}

pub(crate) async fn payment_handler<S, G>(
    State(state): State<RouteState<S, G>>,
    body: Bytes,
) -> Response
where
    S: EnrollmentStore + 'static,
    G: PaymentGateway + 'static,
{
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => {
            return state.cors.respond(
                StatusCode::BAD_REQUEST,
                json!({ "error": "Request body must be valid JSON" }),
            );
        }
    };

    let service = Arc::clone(&state.service);
    let result = tokio::task::spawn_blocking(move || service.submit(&payload)).await;

    match result {
        Ok(Ok(outcome)) => state.cors.respond(StatusCode::OK, success_body(outcome)),
        Ok(Err(err)) => {
            let (status, body) = error_body(err, state.service.support_email());
            state.cors.respond(status, body)
        }
        Err(join_error) => {
            error!(error = %join_error, "payment submission task aborted");
            state.cors.respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": GENERIC_FAILURE }),
            )
        }
    }
}

fn success_body(outcome: EnrollmentOutcome) -> Value {
    match outcome {
        EnrollmentOutcome::Ignored => json!({
            "success": true,
            "message": "Thank you! Your submission has been received.",
            "enrolled": false,
        }),
        EnrollmentOutcome::Enrolled {
            payment_reference, ..
        } => json!({
            "success": true,
            "message": "Payment successful! Your enrollment is confirmed and a receipt is on its way.",
            "enrolled": true,
            "paymentId": payment_reference,
        }),
        EnrollmentOutcome::InvoiceRequested { .. } => json!({
            "success": true,
            "message": "Invoice request received. Your invoice has been emailed and is due upon receipt.",
            "enrolled": false,
            "pendingPayment": true,
        }),
    }
}

fn error_body(err: EnrollmentError, support_email: &str) -> (StatusCode, Value) {
    match err {
        EnrollmentError::Validation(invalid) => {
            let mut body = json!({ "error": invalid.to_string() });
            if let Some(field) = invalid.field() {
                body["field"] = json!(field);
            }
            (StatusCode::BAD_REQUEST, body)
        }
        EnrollmentError::NotFound { .. } => (
            StatusCode::NOT_FOUND,
            json!({
                "error": "Application not found. Please submit an application before completing payment.",
            }),
        ),
        EnrollmentError::AlreadyPaid { enrolled_at, .. } => {
            let since = enrolled_at
                .map(|at| format!(" on {}", at.format("%B %-d, %Y")))
                .unwrap_or_default();
            (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!(
                        "This application has already been paid{since}. If you believe this is a \
                         mistake, please contact {support_email}."
                    ),
                    "enrolledAt": enrolled_at,
                    "support": support_email,
                }),
            )
        }
        EnrollmentError::Declined(decline) => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": decline.message,
                "declineCode": decline.code,
                "requiresAction": decline.requires_action,
            }),
        ),
        err @ (EnrollmentError::Dependency { .. }
        | EnrollmentError::Pricing(_)
        | EnrollmentError::ReconciliationRequired { .. }) => {
            error!(error = %err, "payment submission failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": GENERIC_FAILURE }),
            )
        }
    }
}
