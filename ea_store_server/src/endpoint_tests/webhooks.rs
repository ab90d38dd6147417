use actix_web::{
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use ea_store_engine::{
    db_types::{OrderStatusType, PaymentMethod},
    traits::{GatewayError, ProviderVerdict},
    SqliteDatabase,
    StaticCatalog,
    WebhookNormalizer,
};
use serde_json::{json, Value};

use super::{
    helpers::{send_request, webhook_secret, TestStore, WEBHOOK_SECRET},
    mocks::{MockGateway, MockMailer},
};
use crate::{
    helpers::WEBHOOK_SECRET_HEADER,
    routes::{WebhookIpnRoute, WebhookRoute},
};

type Webhook = WebhookRoute<SqliteDatabase, StaticCatalog, MockMailer, MockGateway>;
type WebhookIpn = WebhookIpnRoute<SqliteDatabase, StaticCatalog, MockMailer, MockGateway>;

fn configure(store: &TestStore, gateway: MockGateway, mailer: MockMailer) -> impl FnOnce(&mut ServiceConfig) {
    let normalizer = WebhookNormalizer::new(gateway, store.db.clone());
    let api = store.fulfillment_api(mailer);
    move |cfg: &mut ServiceConfig| {
        cfg.service(web::scope("/api/webhook").service(Webhook::new()).service(WebhookIpn::new()))
            .app_data(web::Data::new(normalizer))
            .app_data(web::Data::new(api))
            .app_data(webhook_secret());
    }
}

/// A generic `{orderId, status}` notification from a trusted integration.
fn generic_notification(payload: &Value) -> TestRequest {
    TestRequest::post().uri("/api/webhook").insert_header((WEBHOOK_SECRET_HEADER, WEBHOOK_SECRET)).set_json(payload)
}

fn mailer_expecting(calls: usize) -> MockMailer {
    let mut mailer = MockMailer::new();
    mailer.expect_send_purchase_confirmation().times(calls).returning(|_| Ok(()));
    mailer
}

fn json_body(body: &str) -> Value {
    serde_json::from_str(body).expect("Response is not JSON")
}

#[actix_web::test]
async fn generic_notification_completes_the_order() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Pesapal).await;
    let mut mailer = MockMailer::new();
    let order_id = order.order_id.clone();
    mailer
        .expect_send_purchase_confirmation()
        .withf(move |c| c.order_id == order_id && c.email == "amy@example.com")
        .times(1)
        .returning(|_| Ok(()));
    let payload = json!({"orderId": order.order_id, "status": "completed", "transactionId": "TX-OK-1"});
    let req = generic_notification(&payload);
    let (status, body) = send_request(req, configure(&store, MockGateway::new(), mailer)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["success"], true);

    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Completed);
    assert!(order.ea_delivered);
    assert!(order.email_sent);
    assert_eq!(order.transaction_id.as_deref(), Some("TX-OK-1"));
    store.tear_down().await;
}

#[actix_web::test]
async fn duplicate_notifications_send_one_email() {
    let store = TestStore::new().await;
    let order = store.pending_order("amy@example.com", "Gold Scalper Pro", PaymentMethod::Pesapal).await;
    let app = App::new().configure(configure(&store, MockGateway::new(), mailer_expecting(1)));
    let service = test::init_service(app).await;
    let payload = json!({"orderId": order.order_id, "status": "success"});
    for _ in 0..2 {
        let req = generic_notification(&payload).to_request();
        let res = test::call_service(&service, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
    drop(service);
    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Completed);
    let entitlements = store.entitlement_api().entitlements_for_customer("amy@example.com").await.unwrap();
    assert_eq!(entitlements.len(), 1);
    store.tear_down().await;
}

#[actix_web::test]
async fn late_failure_is_acknowledged_but_ignored() {
    let store = TestStore::new().await;
    let order = store.pending_order("ben@example.com", "Trend Rider", PaymentMethod::Mpesa).await;
    let app = App::new().configure(configure(&store, MockGateway::new(), mailer_expecting(1)));
    let service = test::init_service(app).await;

    let paid = json!({"orderId": order.order_id, "status": "paid"});
    let req = generic_notification(&paid).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let failed = json!({"orderId": order.order_id, "status": "Invalid"});
    let req = generic_notification(&failed).to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("already completed"));
    drop(service);

    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Completed);
    assert!(order.failure_reason.is_none());
    store.tear_down().await;
}

#[actix_web::test]
async fn malformed_json_is_a_bad_request() {
    let store = TestStore::new().await;
    let req =
        TestRequest::post().uri("/api/webhook").insert_header(ContentType::json()).set_payload("{\"orderId\": ");
    let (status, body) = send_request(req, configure(&store, MockGateway::new(), MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["success"], false);
    store.tear_down().await;
}

#[actix_web::test]
async fn payload_without_an_order_is_a_bad_request() {
    let store = TestStore::new().await;
    let req = generic_notification(&json!({"status": "completed"}));
    let (status, _) = send_request(req, configure(&store, MockGateway::new(), MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    store.tear_down().await;
}

#[actix_web::test]
async fn unknown_order_is_not_found() {
    let store = TestStore::new().await;
    let req = generic_notification(&json!({"orderId": "ORD-1718000000000-NOPE00", "status": "completed"}));
    let (status, body) = send_request(req, configure(&store, MockGateway::new(), MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("ORD-1718000000000-NOPE00"));
    store.tear_down().await;
}

#[actix_web::test]
async fn paypal_webhook_with_invalid_signature_is_rejected() {
    let store = TestStore::new().await;
    let order = store.pending_order("cat@example.com", "Gold Scalper Pro", PaymentMethod::Paypal).await;
    let mut gateway = MockGateway::new();
    gateway.expect_verify_paypal_webhook().times(1).returning(|_, _| Ok(false));
    let payload = json!({
        "id": "WH-2WR32451HC0233532-67976317FL4543714",
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": {"id": "7NW873794T343360M", "custom_id": order.order_id, "status": "COMPLETED"}
    });
    let req = TestRequest::post()
        .uri("/api/webhook")
        .insert_header(("PAYPAL-TRANSMISSION-ID", "69cd13f0-d67a-11e5-baa3-778b53f4ae55"))
        .insert_header(("PAYPAL-TRANSMISSION-TIME", "2024-06-10T12:00:00Z"))
        .insert_header(("PAYPAL-TRANSMISSION-SIG", "forged"))
        .insert_header(("PAYPAL-CERT-URL", "https://api.sandbox.paypal.com/v1/notifications/certs/CERT-1"))
        .insert_header(("PAYPAL-AUTH-ALGO", "SHA256withRSA"))
        .set_json(&payload);
    // No confirmation may be sent, so the mailer has no expectations
    let (status, body) = send_request(req, configure(&store, gateway, MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("signature"));

    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(!order.ea_delivered);
    assert!(!order.email_sent);
    store.tear_down().await;
}

#[actix_web::test]
async fn pesapal_outage_is_a_bad_gateway() {
    let store = TestStore::new().await;
    let order = store.pending_order("dan@example.com", "Gold Scalper Pro", PaymentMethod::Pesapal).await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_verify_pesapal_transaction()
        .returning(|_| Err(GatewayError::Unavailable("connection refused".into())));
    let payload = json!({"OrderTrackingId": "trk-1", "OrderMerchantReference": order.order_id});
    let req = TestRequest::post().uri("/api/webhook").set_json(&payload);
    let (status, _) = send_request(req, configure(&store, gateway, MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(store.order(&order.order_id).await.status, OrderStatusType::Pending);
    store.tear_down().await;
}

#[actix_web::test]
async fn pesapal_get_ipn_is_verified_and_applied() {
    let store = TestStore::new().await;
    let order = store.pending_order("eve@example.com", "Gold Scalper Pro", PaymentMethod::Pesapal).await;
    let reference = order.order_id.to_string();
    let mut gateway = MockGateway::new();
    gateway.expect_verify_pesapal_transaction().withf(|tracking_id| tracking_id == "trk-2").times(1).returning(
        move |_| {
            Ok(ProviderVerdict {
                success: true,
                status: "Completed".into(),
                transaction_id: Some("PSP-CONF-2".into()),
                merchant_reference: Some(reference.clone()),
                amount: None,
            })
        },
    );
    let uri = format!(
        "/api/webhook?OrderTrackingId=trk-2&OrderMerchantReference={}&OrderNotificationType=IPNCHANGE",
        order.order_id
    );
    let req = TestRequest::get().uri(&uri);
    let (status, body) = send_request(req, configure(&store, gateway, mailer_expecting(1))).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["success"], true);
    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.transaction_id.as_deref(), Some("PSP-CONF-2"));
    store.tear_down().await;
}

#[actix_web::test]
async fn generic_notification_without_the_webhook_secret_is_refused() {
    let store = TestStore::new().await;
    let order = store.pending_order("fay@example.com", "Gold Scalper Pro", PaymentMethod::Pesapal).await;
    let payload = json!({"orderId": order.order_id, "status": "completed"});
    let unsigned = TestRequest::post().uri("/api/webhook").set_json(&payload);
    let wrong =
        TestRequest::post().uri("/api/webhook").insert_header((WEBHOOK_SECRET_HEADER, "guess")).set_json(&payload);
    let query = TestRequest::get().uri(&format!("/api/webhook?orderId={}&status=completed", order.order_id));
    for req in [unsigned, wrong, query] {
        // No confirmation may be sent, so the mailer has no expectations
        let (status, body) = send_request(req, configure(&store, MockGateway::new(), MockMailer::new())).await.unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(&body)["success"], false);
    }
    let order = store.order(&order.order_id).await;
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(!order.ea_delivered);
    store.tear_down().await;
}

#[actix_web::test]
async fn pesapal_tracking_id_cannot_be_replayed_against_another_order() {
    let store = TestStore::new().await;
    let paid = store.pending_order("gus@example.com", "Gold Scalper Pro", PaymentMethod::Pesapal).await;
    let victim = store.pending_order("hal@example.com", "Gold Scalper Pro", PaymentMethod::Pesapal).await;
    let reference = paid.order_id.to_string();
    let mut gateway = MockGateway::new();
    gateway.expect_verify_pesapal_transaction().times(1).returning(move |_| {
        Ok(ProviderVerdict {
            success: true,
            status: "Completed".into(),
            transaction_id: Some("PSP-CONF-3".into()),
            merchant_reference: Some(reference.clone()),
            amount: None,
        })
    });
    let payload = json!({"OrderTrackingId": "trk-3", "OrderMerchantReference": victim.order_id});
    let req = TestRequest::post().uri("/api/webhook").set_json(&payload);
    let (status, body) = send_request(req, configure(&store, gateway, MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("different order"));
    assert_eq!(store.order(&victim.order_id).await.status, OrderStatusType::Pending);
    assert_eq!(store.order(&paid.order_id).await.status, OrderStatusType::Pending);
    store.tear_down().await;
}

#[actix_web::test]
async fn unmigrated_store_is_unavailable() {
    let store = TestStore::unmigrated().await;
    let req = generic_notification(&json!({"orderId": "ORD-1718000000000-ABC123", "status": "completed"}));
    let (status, body) = send_request(req, configure(&store, MockGateway::new(), MockMailer::new())).await.unwrap();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(&body)["hint"], "has the database been migrated?");
    store.tear_down().await;
}
