use crate::infra::AppState;
use crate::quote::{price, QuoteRequest};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use enrollment_pay::error::AppError;
use enrollment_pay::workflows::enrollment::{
    enrollment_router, CorsPolicy, EnrollmentPaymentService, EnrollmentStore, PaymentGateway,
    PricingPolicy, TierCatalog, BASE_SEATS,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) const QUOTE_ROUTE: &str = "/api/quote";

/// Catalog and surcharges the quote endpoint prices against.
#[derive(Clone)]
pub(crate) struct PriceBook {
    catalog: Arc<TierCatalog>,
    policy: Arc<PricingPolicy>,
}

pub(crate) fn with_enrollment_routes<S, G>(
    service: Arc<EnrollmentPaymentService<S, G>>,
    cors: CorsPolicy,
) -> axum::Router
where
    S: EnrollmentStore + 'static,
    G: PaymentGateway + 'static,
{
    let prices = PriceBook {
        catalog: Arc::new(service.catalog().clone()),
        policy: Arc::new(service.pricing().clone()),
    };
    enrollment_router(service, cors)
        .route(
            QUOTE_ROUTE,
            axum::routing::post(quote_endpoint).layer(Extension(prices)),
        )
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn quote_endpoint(
    Extension(prices): Extension<PriceBook>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (tier, quote) = price(
        &prices.catalog,
        &prices.policy,
        &request.tier,
        request.additional_seats,
        request.support_hours,
    )?;

    Ok(Json(json!({
        "tier": tier.key,
        "label": tier.label,
        "totalSeats": BASE_SEATS + quote.additional_seats,
        "quote": quote,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::build_enrollment_service;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use enrollment_pay::config::EnrollmentSettings;
    use enrollment_pay::workflows::enrollment::PAYMENT_ROUTE;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let settings = EnrollmentSettings::default();
        let service = build_enrollment_service(&settings).expect("service builds");
        let cors = CorsPolicy::new(&settings.allowed_origin).expect("origin");
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_enrollment_routes(Arc::new(service), cors).layer(Extension(state))
    }

    async fn get(router: axum::Router, uri: &str) -> axum::response::Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response")
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let response = get(app(false), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_tracks_flag() {
        assert_eq!(
            get(app(false), "/ready").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(get(app(true), "/ready").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn payment_route_is_mounted_alongside_health_routes() {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri(PAYMENT_ROUTE)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|value| value.to_str().ok()),
            Some("http://localhost:8080")
        );
    }

    async fn post_quote(body: serde_json::Value) -> axum::response::Response {
        app(true)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(QUOTE_ROUTE)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn quote_endpoint_prices_configured_tier() {
        let response =
            post_quote(json!({ "tier": "$13,500", "additionalSeats": 5, "supportHours": 2 })).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["label"], "Professional");
        assert_eq!(body["totalSeats"], 15);
        assert_eq!(body["quote"]["total_cents"], 2_085_000);
        assert_eq!(body["quote"]["support_surcharge_cents"], 60_000);
    }

    #[tokio::test]
    async fn quote_endpoint_reports_invalid_input_as_bad_request() {
        let unknown = post_quote(json!({ "tier": "$10,000" })).await;
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        let body = json_body(unknown).await;
        assert!(body["error"]
            .as_str()
            .is_some_and(|message| message.contains("$10,000")));

        let excess = post_quote(json!({ "tier": "$6,500", "additionalSeats": 41 })).await;
        assert_eq!(excess.status(), StatusCode::BAD_REQUEST);
    }
}
