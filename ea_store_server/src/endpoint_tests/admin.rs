use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use ea_store_engine::{
    db_types::{NewOrder, OrderId, OrderStatusType, PaymentMethod},
    test_utils::fakes::{test_catalog, RecordingNotifier},
    Notifier,
    SqliteDatabase,
    StaticCatalog,
};
use eas_common::Money;
use serde_json::{json, Value};

use super::{
    helpers::{admin_secret, send_request, server_options_with_catalog, TestStore, ADMIN_SECRET},
    mocks::MockMailer,
};
use crate::routes::{
    reload_catalog,
    CompleteOrderRoute,
    CustomerEntitlementsRoute,
    OrderDiagnosticsRoute,
    RecordDownloadRoute,
    RetrySideEffectsRoute,
};

fn configure<N>(store: &TestStore, notifier: N) -> impl FnOnce(&mut ServiceConfig)
where N: Notifier + 'static {
    let fulfillment_api = store.fulfillment_api(notifier);
    let entitlement_api = store.entitlement_api();
    move |cfg: &mut ServiceConfig| {
        let scope = web::scope("/api")
            .service(CompleteOrderRoute::<SqliteDatabase, StaticCatalog, N>::new())
            .service(RetrySideEffectsRoute::<SqliteDatabase, StaticCatalog, N>::new())
            .service(OrderDiagnosticsRoute::<SqliteDatabase, StaticCatalog, N>::new())
            .service(CustomerEntitlementsRoute::<SqliteDatabase>::new())
            .service(RecordDownloadRoute::<SqliteDatabase>::new());
        cfg.service(scope)
            .app_data(web::Data::new(fulfillment_api))
            .app_data(web::Data::new(entitlement_api))
            .app_data(admin_secret());
    }
}

fn json_body(body: &str) -> Value {
    serde_json::from_str(body).expect("Response is not JSON")
}

#[actix_web::test]
async fn manual_completion_needs_the_admin_secret() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    for secret in ["", "eas-admin-4f1c9", "EAS-ADMIN-4F1C9E", "eas-admin-4f1c9e "] {
        let req = TestRequest::post()
            .uri("/api/orders/complete")
            .set_json(json!({"orderId": order.order_id, "adminSecret": secret}));
        let (status, body) = send_request(req, configure(&store, MockMailer::new())).await.unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED, "secret '{secret}' was accepted");
        assert_eq!(json_body(&body)["error"], "Invalid credentials");
    }
    assert_eq!(store.order(&order.order_id).await.status, OrderStatusType::Pending);
    store.tear_down().await;
}

#[actix_web::test]
async fn manual_completion() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    let notifier = RecordingNotifier::new();
    let req = TestRequest::post().uri("/api/orders/complete").set_json(json!({
        "orderId": order.order_id,
        "adminSecret": ADMIN_SECRET,
        "transactionId": "5O190127TN364715T"
    }));
    let (status, body) = send_request(req, configure(&store, notifier.clone())).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["orderId"], order.order_id.as_str());
    assert_eq!(body["email"], "amy@example.com");
    assert_eq!(body["artifactName"], "Gold Scalper Pro");
    assert!(body.get("warning").is_none());
    assert_eq!(notifier.sent_count(), 1);

    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.transaction_id.as_deref(), Some("5O190127TN364715T"));
    store.tear_down().await;
}

#[actix_web::test]
async fn completing_a_missing_order_is_not_found() {
    let store = TestStore::new().await;
    let req = TestRequest::post()
        .uri("/api/orders/complete")
        .set_json(json!({"orderId": "ORD-1718000000000-NOPE00", "adminSecret": ADMIN_SECRET}));
    let (status, _) = send_request(req, configure(&store, MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    store.tear_down().await;
}

#[actix_web::test]
async fn completing_a_failed_order_is_a_conflict() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    store.checkout_api().record_initiation_failure(&order.order_id, "PayPal said no").await.unwrap();
    let req = TestRequest::post()
        .uri("/api/orders/complete")
        .set_json(json!({"orderId": order.order_id, "adminSecret": ADMIN_SECRET}));
    let (status, body) = send_request(req, configure(&store, MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("manual review"));
    assert_eq!(store.order(&order.order_id).await.status, OrderStatusType::Failed);
    store.tear_down().await;
}

#[actix_web::test]
async fn mail_outage_is_a_warning_and_retry_heals_it() {
    let store = TestStore::new().await;
    let order = store.pending_order("ben@example.com", "Trend Rider", PaymentMethod::Mpesa).await;
    let notifier = RecordingNotifier::new();
    notifier.set_failing(true);
    let req = TestRequest::post()
        .uri("/api/orders/complete")
        .set_json(json!({"orderId": order.order_id, "adminSecret": ADMIN_SECRET}));
    let (status, body) = send_request(req, configure(&store, notifier.clone())).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["success"], true);
    assert!(body["warning"].as_str().unwrap().contains("Confirmation email was not sent"));
    let stored = store.order(&order.order_id).await;
    assert!(stored.ea_delivered);
    assert!(!stored.email_sent);
    assert!(stored.email_error.is_some());

    notifier.set_failing(false);
    let req = TestRequest::post()
        .uri("/api/admin/retry")
        .set_json(json!({"orderId": order.order_id, "adminSecret": ADMIN_SECRET}));
    let (status, body) = send_request(req, configure(&store, notifier.clone())).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["emailSent"], true);
    assert_eq!(body["eaDelivered"], true);
    assert_eq!(body["entitlement"], "AlreadyDone");
    assert_eq!(body["email"], "Performed");
    assert_eq!(notifier.sent_count(), 1);

    // A second retry has nothing left to do
    let req = TestRequest::post()
        .uri("/api/admin/retry")
        .set_json(json!({"orderId": order.order_id, "adminSecret": ADMIN_SECRET}));
    let (status, body) = send_request(req, configure(&store, notifier.clone())).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["email"], "AlreadyDone");
    assert_eq!(notifier.sent_count(), 1);
    store.tear_down().await;
}

#[actix_web::test]
async fn retry_requires_a_completed_order() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Pesapal).await;
    let req = TestRequest::post()
        .uri("/api/admin/retry")
        .set_json(json!({"orderId": order.order_id, "adminSecret": ADMIN_SECRET}));
    let (status, body) = send_request(req, configure(&store, MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("pending"));

    let req =
        TestRequest::post().uri("/api/admin/retry").set_json(json!({"orderId": order.order_id, "adminSecret": "x"}));
    let (status, _) = send_request(req, configure(&store, MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    store.tear_down().await;
}

#[actix_web::test]
async fn diagnostics_do_not_change_the_order() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Pesapal).await;
    let uri = format!("/api/admin/retry?orderId={}&adminSecret={ADMIN_SECRET}", order.order_id);
    // Any attempt to send mail would fail the test
    let req = TestRequest::get().uri(&uri);
    let (status, body) = send_request(req, configure(&store, MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["order"]["order_id"], order.order_id.as_str());
    assert_eq!(body["order"]["status"], "pending");
    assert!(body["entitlement"].is_null());
    let stored = store.order(&order.order_id).await;
    assert_eq!(stored.status, OrderStatusType::Pending);
    assert!(stored.last_retry_at.is_none());

    let uri = format!("/api/admin/retry?orderId={}&adminSecret=nope", order.order_id);
    let (status, _) = send_request(TestRequest::get().uri(&uri), configure(&store, MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    store.tear_down().await;
}

#[actix_web::test]
async fn entitlements_and_downloads() {
    let store = TestStore::new().await;
    let order = store.pending_order("Amy@Example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    let notifier = RecordingNotifier::new();
    let req = TestRequest::post()
        .uri("/api/orders/complete")
        .set_json(json!({"orderId": order.order_id, "adminSecret": ADMIN_SECRET}));
    let (status, _) = send_request(req, configure(&store, notifier.clone())).await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/admin/entitlements?email=amy@example.com&adminSecret={ADMIN_SECRET}");
    let (status, body) = send_request(TestRequest::get().uri(&uri), configure(&store, notifier.clone())).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let entitlements = json_body(&body);
    let entitlements = entitlements.as_array().unwrap();
    assert_eq!(entitlements.len(), 1);
    assert_eq!(entitlements[0]["artifact_name"], "Gold Scalper Pro");
    assert_eq!(entitlements[0]["order_id"], order.order_id.as_str());
    assert_eq!(entitlements[0]["download_count"], 0);
    let entitlement_id = entitlements[0]["id"].as_str().unwrap().to_string();

    let req = TestRequest::post().uri("/api/admin/downloads").set_json(json!({
        "email": "amy@example.com",
        "entitlementId": entitlement_id,
        "adminSecret": ADMIN_SECRET
    }));
    let (status, body) = send_request(req, configure(&store, notifier.clone())).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["download_count"], 1);
    assert!(!body["last_downloaded"].is_null());

    let req = TestRequest::post().uri("/api/admin/downloads").set_json(json!({
        "email": "someone.else@example.com",
        "entitlementId": entitlement_id,
        "adminSecret": ADMIN_SECRET
    }));
    let (status, _) = send_request(req, configure(&store, notifier)).await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    store.tear_down().await;
}

const RELOADED_CATALOG: &str = r#"[
    {"name": "Gold Scalper Pro", "version": "2.1.0", "price": "49.99", "currency": "USD", "file": "gsp.ex5"},
    {"name": "Trend Rider", "version": "1.0.3", "price": "1500", "currency": "KES", "file": "tr.ex4"},
    {"name": "Discontinued Bot", "version": "0.9.1", "price": "49.99", "currency": "USD", "file": "db.ex4"}
]"#;

#[actix_web::test]
async fn catalog_reload_lets_retry_deliver_a_missing_artifact() {
    let store = TestStore::new().await;
    let order = NewOrder::new(
        OrderId::generate(),
        "gina@example.com".to_string(),
        "Discontinued Bot".to_string(),
        PaymentMethod::Paypal,
        Money::from(4999),
        "USD".to_string(),
    );
    let order = store.checkout_api().create_order(order).await.unwrap();
    let catalog_path = std::env::temp_dir().join(format!("eas-catalog-{}.json", order.order_id));
    std::fs::write(&catalog_path, RELOADED_CATALOG).unwrap();

    let catalog = test_catalog();
    let notifier = RecordingNotifier::new();
    let fulfillment_api = store.fulfillment_api_with_catalog(notifier.clone(), catalog.clone());
    let options = server_options_with_catalog(&catalog_path.to_string_lossy());
    let app = App::new()
        .service(
            web::scope("/api")
                .service(CompleteOrderRoute::<SqliteDatabase, StaticCatalog, RecordingNotifier>::new())
                .service(RetrySideEffectsRoute::<SqliteDatabase, StaticCatalog, RecordingNotifier>::new())
                .service(reload_catalog),
        )
        .app_data(web::Data::new(fulfillment_api))
        .app_data(web::Data::new(catalog))
        .app_data(options)
        .app_data(admin_secret());
    let service = test::init_service(app).await;

    let req = TestRequest::post()
        .uri("/api/orders/complete")
        .set_json(json!({"orderId": order.order_id, "adminSecret": ADMIN_SECRET}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert!(body["warning"].as_str().unwrap().contains("Discontinued Bot"));

    let req = TestRequest::post().uri("/api/admin/catalog/reload").set_json(json!({"adminSecret": "x"})).to_request();
    assert_eq!(test::call_service(&service, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri("/api/admin/catalog/reload")
        .set_json(json!({"adminSecret": ADMIN_SECRET}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "3 artifacts for sale");

    let req = TestRequest::post()
        .uri("/api/admin/retry")
        .set_json(json!({"orderId": order.order_id, "adminSecret": ADMIN_SECRET}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["entitlement"], "Performed");
    assert_eq!(body["email"], "AlreadyDone");
    assert_eq!(body["eaDelivered"], true);
    drop(service);

    let stored = store.order(&order.order_id).await;
    assert!(stored.ea_delivered);
    assert!(stored.ea_delivery_error.is_none());
    assert_eq!(notifier.sent_count(), 1);
    std::fs::remove_file(&catalog_path).unwrap();
    store.tear_down().await;
}
