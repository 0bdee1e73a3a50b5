//! End-to-end enrollment payment scenarios driven through the public router.
//!
//! Applications are seeded from CSV the way the service binary loads them, then submissions go
//! through HTTP so validation, pricing, settlement, and notification are exercised together.

mod common {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use enrollment_pay::workflows::enrollment::notify::{
        EmbeddedTemplates, HtmlInvoiceRenderer, MailError, Mailer, NotificationDispatcher,
        NotificationSettings, OutboundEmail,
    };
    use enrollment_pay::workflows::enrollment::{
        enrollment_router, ChargeReceipt, ChargeRequest, ChargeStatus, CorsPolicy,
        EnrollmentPaymentService, GatewayError, InMemoryEnrollmentStore, PaymentGateway,
        PricingPolicy, RetryPolicy, ServiceSettings, TierCatalog,
    };

    const SEED: &str = "\
applicant,name,company,job_title,phone,country,tier,payment_status
ada@example.com,Ada Lovelace,Analytical Engines,Engineer,555-0100,UK,\"$13,500\",
grace@example.com,Grace Hopper,US Navy,Rear Admiral,555-0199,US,\"$21,000\",
alan@example.com,Alan Turing,Bletchley,Cryptanalyst,555-0142,UK,\"$6,500\",paid
";

    #[derive(Debug, Default)]
    pub struct ApprovingGateway {
        pub charges: Mutex<Vec<ChargeRequest>>,
    }

    impl PaymentGateway for ApprovingGateway {
        fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
            let mut charges = self.charges.lock().expect("gateway mutex");
            charges.push(request.clone());
            Ok(ChargeReceipt {
                status: ChargeStatus::Succeeded,
                reference: format!("pi_{:04}", charges.len()),
            })
        }
    }

    #[derive(Default)]
    pub struct Outbox {
        pub sent: Mutex<Vec<OutboundEmail>>,
    }

    impl Mailer for Outbox {
        fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
            self.sent.lock().expect("outbox mutex").push(email.clone());
            Ok(())
        }
    }

    pub struct Harness {
        pub router: axum::Router,
        pub store: Arc<InMemoryEnrollmentStore>,
        pub gateway: Arc<ApprovingGateway>,
        pub outbox: Arc<Outbox>,
    }

    pub fn harness() -> Harness {
        let store = Arc::new(InMemoryEnrollmentStore::default());
        let loaded = store.seed_from_csv(SEED.as_bytes()).expect("seed applications");
        assert_eq!(loaded, 3);

        let gateway = Arc::new(ApprovingGateway::default());
        let outbox = Arc::new(Outbox::default());
        let dispatcher = NotificationDispatcher::new(
            outbox.clone(),
            Arc::new(HtmlInvoiceRenderer),
            Arc::new(EmbeddedTemplates),
            NotificationSettings {
                from: "enrollment@example.com".to_string(),
                support_email: "help@example.com".to_string(),
                retry: RetryPolicy::single_attempt(),
            },
        );
        let service = EnrollmentPaymentService::new(
            store.clone(),
            gateway.clone(),
            dispatcher,
            TierCatalog::fixed_dollar(),
            PricingPolicy::default(),
            ServiceSettings {
                currency: "usd".to_string(),
                retry: RetryPolicy::new(2, Duration::ZERO),
            },
        );
        let cors = CorsPolicy::new("https://enroll.example.com").expect("origin");

        Harness {
            router: enrollment_router(Arc::new(service), cors),
            store,
            gateway,
            outbox,
        }
    }
}

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use enrollment_pay::workflows::enrollment::{
    ApplicantEmail, EnrollmentPaymentStatus, PaymentStatus, PAYMENT_ROUTE,
};

async fn submit(router: axum::Router, payload: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(PAYMENT_ROUTE)
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json"))
}

fn submission(applicant: &str, tier: &str, seats: u32, method: &str) -> Value {
    let mut payload = json!({
        "applicant": applicant,
        "name": "Applicant Name",
        "tier": tier,
        "additionalSeats": seats,
        "paymentMethod": method,
        "company": "Example Co",
        "jobTitle": "Director",
        "phone": "555-0000",
        "country": "US",
    });
    if method == "credit-card" {
        payload["paymentMethodId"] = json!("pm_card_visa");
    }
    payload
}

#[tokio::test]
async fn card_payment_with_extra_seats_enrolls_applicant() {
    let harness = common::harness();

    let (status, body) = submit(
        harness.router.clone(),
        submission("ada@example.com", "$13,500", 5, "credit-card"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enrolled"], json!(true));

    let ada = ApplicantEmail::new("ada@example.com");
    let application = harness.store.application(&ada).expect("application");
    assert_eq!(application.payment_status, PaymentStatus::Paid);
    assert_eq!(application.payment_amount_cents, Some(2_025_000));

    let record = harness.store.enrollment(&ada).expect("enrollment");
    assert_eq!(record.total_seats, 15);
    assert_eq!(record.payment_status, EnrollmentPaymentStatus::Complete);

    let charges = harness.gateway.charges.lock().expect("charges").clone();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount_cents, 2_025_000);

    let sent = harness.outbox.sent.lock().expect("outbox").clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].attachments[0].filename, "INV-000001.html");
}

#[tokio::test]
async fn invoice_request_records_pending_enrollment() {
    let harness = common::harness();

    let (status, body) = submit(
        harness.router.clone(),
        submission("grace@example.com", "$21,000", 2, "invoice"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pendingPayment"], json!(true));

    let grace = ApplicantEmail::new("grace@example.com");
    let application = harness.store.application(&grace).expect("application");
    assert_eq!(application.payment_status, PaymentStatus::Pending);
    assert_eq!(application.payment_amount_cents, Some(2_520_000));

    let record = harness.store.enrollment(&grace).expect("enrollment");
    assert_eq!(record.amount_paid_cents, 0);
    assert_eq!(record.total_seats, 12);
    assert!(harness.gateway.charges.lock().expect("charges").is_empty());
}

#[tokio::test]
async fn unknown_fee_is_rejected_before_any_write() {
    let harness = common::harness();

    let (status, body) = submit(
        harness.router.clone(),
        submission("ada@example.com", "$10,000", 0, "credit-card"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], json!("tier"));
    assert_eq!(harness.store.enrollment_count(), 0);
    assert!(harness.gateway.charges.lock().expect("charges").is_empty());
    assert!(harness.outbox.sent.lock().expect("outbox").is_empty());
}

#[tokio::test]
async fn seeded_paid_application_cannot_pay_again() {
    let harness = common::harness();

    let (status, body) = submit(
        harness.router.clone(),
        submission("alan@example.com", "$6,500", 0, "credit-card"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["support"], json!("help@example.com"));
    assert!(harness.gateway.charges.lock().expect("charges").is_empty());
}

#[tokio::test]
async fn invoice_then_card_settles_once() {
    let harness = common::harness();

    let (status, _) = submit(
        harness.router.clone(),
        submission("grace@example.com", "$21,000", 0, "invoice"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = submit(
        harness.router.clone(),
        submission("grace@example.com", "$21,000", 0, "credit-card"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = submit(
        harness.router.clone(),
        submission("grace@example.com", "$21,000", 0, "credit-card"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(harness.gateway.charges.lock().expect("charges").len(), 1);
    let sent = harness.outbox.sent.lock().expect("outbox").clone();
    let numbers = sent
        .iter()
        .map(|email| email.attachments[0].filename.as_str())
        .collect::<Vec<_>>();
    assert_eq!(numbers, ["INV-000001.html", "INV-000002.html"]);
}
