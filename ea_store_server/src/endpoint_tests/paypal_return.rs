use actix_web::{http::StatusCode, web, web::ServiceConfig};
use ea_store_engine::{
    db_types::{OrderStatusType, PaymentMethod},
    test_utils::fakes::RecordingNotifier,
    traits::{GatewayError, PaypalCapture},
    PaymentProvider,
    PaymentVerdict,
    SqliteDatabase,
    StaticCatalog,
};
use eas_common::Money;

use super::{
    helpers::{get_redirect, server_options, TestStore, DASHBOARD_URL},
    mocks::MockGateway,
};
use crate::routes::PaypalReturnRoute;

type PaypalReturn = PaypalReturnRoute<SqliteDatabase, StaticCatalog, RecordingNotifier, MockGateway>;

fn configure(store: &TestStore, gateway: MockGateway, notifier: RecordingNotifier) -> impl FnOnce(&mut ServiceConfig) {
    let checkout_api = store.checkout_api();
    let fulfillment_api = store.fulfillment_api(notifier);
    move |cfg: &mut ServiceConfig| {
        cfg.service(web::scope("/api").service(PaypalReturn::new()))
            .app_data(web::Data::new(gateway))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(fulfillment_api))
            .app_data(server_options());
    }
}

fn capture(token: &str, custom_id: Option<&str>, status: &str) -> PaypalCapture {
    PaypalCapture {
        paypal_order_id: token.to_string(),
        completed: status == "COMPLETED",
        status: status.to_string(),
        custom_id: custom_id.map(String::from),
        capture_id: Some(format!("CAP-{token}")),
        amount: Some(Money::from(4999)),
    }
}

fn gateway_capturing(expected_token: &'static str, result: PaypalCapture) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway
        .expect_capture_paypal_order()
        .withf(move |token| token == expected_token)
        .times(1)
        .returning(move |_| Ok(result.clone()));
    gateway
}

fn warning(flag: &str) -> String {
    format!("{DASHBOARD_URL}?warning={flag}")
}

#[actix_web::test]
async fn approved_payment_is_captured_and_completed() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    let result = capture("5O190127TN364715T", Some(order.order_id.as_str()), "COMPLETED");
    let gateway = gateway_capturing("5O190127TN364715T", result);
    let notifier = RecordingNotifier::new();
    let path = "/api/paypal/return?token=5O190127TN364715T&PayerID=QYR5Z8XDVJNXQ";
    let (status, location) = get_redirect(path, configure(&store, gateway, notifier.clone())).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, format!("{DASHBOARD_URL}?payment=success&orderId={}", order.order_id));

    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.transaction_id.as_deref(), Some("CAP-5O190127TN364715T"));
    assert!(order.ea_delivered);
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].order_id, order.order_id);
    assert_eq!(sent[0].email, "amy@example.com");
    store.tear_down().await;
}

#[actix_web::test]
async fn order_is_found_by_transaction_id_without_custom_id() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    store.checkout_api().attach_transaction_id(&order.order_id, "8MC585209K746392H").await.unwrap();
    let gateway = gateway_capturing("8MC585209K746392H", capture("8MC585209K746392H", None, "COMPLETED"));
    let path = "/api/paypal/return?token=8MC585209K746392H&PayerID=QYR5Z8XDVJNXQ";
    let (status, location) = get_redirect(path, configure(&store, gateway, RecordingNotifier::new())).await;
    assert_eq!(status, StatusCode::FOUND);
    assert!(location.contains("payment=success"), "unexpected redirect: {location}");
    assert_eq!(store.order(&order.order_id).await.status, OrderStatusType::Completed);
    store.tear_down().await;
}

#[actix_web::test]
async fn missing_token() {
    let store = TestStore::new().await;
    for path in ["/api/paypal/return", "/api/paypal/return?token=&PayerID=QYR5Z8XDVJNXQ"] {
        let config = configure(&store, MockGateway::new(), RecordingNotifier::new());
        let (status, location) = get_redirect(path, config).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(location, warning("missing_token"));
    }
    store.tear_down().await;
}

#[actix_web::test]
async fn failed_capture() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    store.checkout_api().attach_transaction_id(&order.order_id, "2GG279541U471931P").await.unwrap();
    let mut gateway = MockGateway::new();
    gateway
        .expect_capture_paypal_order()
        .returning(|_| Err(GatewayError::Rejected("422: UNPROCESSABLE_ENTITY".into())));
    let path = "/api/paypal/return?token=2GG279541U471931P";
    let (status, location) = get_redirect(path, configure(&store, gateway, RecordingNotifier::new())).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, warning("capture_failed"));
    assert_eq!(store.order(&order.order_id).await.status, OrderStatusType::Pending);
    store.tear_down().await;
}

#[actix_web::test]
async fn failed_capture_of_an_order_the_webhook_already_completed() {
    let store = TestStore::new().await;
    let notifier = RecordingNotifier::new();
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    store.checkout_api().attach_transaction_id(&order.order_id, "2GG279541U471931P").await.unwrap();
    let verdict = PaymentVerdict::success(order.order_id.clone(), PaymentProvider::Paypal);
    store.fulfillment_api(notifier.clone()).complete(&order.order_id, &verdict).await.unwrap();
    let mut gateway = MockGateway::new();
    gateway
        .expect_capture_paypal_order()
        .returning(|_| Err(GatewayError::Rejected("422: ORDER_ALREADY_CAPTURED".into())));
    let path = "/api/paypal/return?token=2GG279541U471931P";
    let (status, location) = get_redirect(path, configure(&store, gateway, notifier.clone())).await;
    assert_eq!(status, StatusCode::FOUND);
    assert!(location.contains("payment=success"), "unexpected redirect: {location}");
    assert_eq!(notifier.sent_count(), 1);
    store.tear_down().await;
}

#[actix_web::test]
async fn unknown_paypal_order() {
    let store = TestStore::new().await;
    let gateway = gateway_capturing("9XX00000000000000", capture("9XX00000000000000", None, "COMPLETED"));
    let path = "/api/paypal/return?token=9XX00000000000000";
    let (status, location) = get_redirect(path, configure(&store, gateway, RecordingNotifier::new())).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, warning("order_not_found"));

    let result = capture("9XX00000000000000", Some("ORD-1718000000000-NOPE00"), "COMPLETED");
    let gateway = gateway_capturing("9XX00000000000000", result);
    let (status, location) = get_redirect(path, configure(&store, gateway, RecordingNotifier::new())).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, warning("order_not_found"));
    store.tear_down().await;
}

#[actix_web::test]
async fn declined_capture_fails_the_order() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    let result = capture("3C679366HH908993F", Some(order.order_id.as_str()), "DECLINED");
    let gateway = gateway_capturing("3C679366HH908993F", result);
    let notifier = RecordingNotifier::new();
    let path = "/api/paypal/return?token=3C679366HH908993F";
    let (status, location) = get_redirect(path, configure(&store, gateway, notifier.clone())).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, warning("payment_failed"));
    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Failed);
    assert!(order.failure_reason.unwrap().contains("DECLINED"));
    assert_eq!(notifier.attempts(), 0);
    store.tear_down().await;
}

#[actix_web::test]
async fn mail_outage_is_flagged_but_the_order_is_paid() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    let result = capture("1AB23456CD789012E", Some(order.order_id.as_str()), "COMPLETED");
    let gateway = gateway_capturing("1AB23456CD789012E", result);
    let notifier = RecordingNotifier::new();
    notifier.set_failing(true);
    let path = "/api/paypal/return?token=1AB23456CD789012E";
    let (status, location) = get_redirect(path, configure(&store, gateway, notifier)).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, warning("fulfillment_incomplete"));
    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Completed);
    assert!(order.ea_delivered);
    assert!(!order.email_sent);
    store.tear_down().await;
}
