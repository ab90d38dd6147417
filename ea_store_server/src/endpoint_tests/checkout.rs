use std::sync::{Arc, Mutex};

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use ea_store_engine::{
    db_types::{OrderId, OrderStatusType, PaymentMethod},
    test_utils::fakes::test_catalog,
    traits::{GatewayError, PaymentInitiation},
    SqliteDatabase,
    StaticCatalog,
};
use eas_common::Money;
use serde_json::{json, Value};

use super::{
    helpers::{send_request, TestStore},
    mocks::MockGateway,
};
use crate::routes::CheckoutRoute;

fn configure(store: &TestStore, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    let api = store.checkout_api();
    move |cfg: &mut ServiceConfig| {
        cfg.service(web::scope("/api").service(CheckoutRoute::<SqliteDatabase, StaticCatalog, MockGateway>::new()))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(test_catalog()))
            .app_data(web::Data::new(gateway));
    }
}

fn json_body(body: &str) -> Value {
    serde_json::from_str(body).expect("Response is not JSON")
}

fn checkout_request(body: Value) -> TestRequest {
    TestRequest::post().uri("/api/checkout").set_json(body)
}

#[actix_web::test]
async fn paypal_checkout() {
    let store = TestStore::new().await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_initiate_payment()
        .withf(|r| {
            r.method == PaymentMethod::Paypal &&
                r.amount == Money::from(4999) &&
                r.currency == "USD" &&
                r.email == "amy@example.com" &&
                r.description == "Gold Scalper Pro v2.1.0"
        })
        .times(1)
        .returning(|_| {
            Ok(PaymentInitiation {
                transaction_id: "5O190127TN364715T".into(),
                redirect_url: Some("https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T".into()),
                message: "Redirect the buyer to PayPal".into(),
            })
        });
    let req = checkout_request(json!({
        "email": " amy@example.com ",
        "artifactName": "Gold Scalper Pro",
        "paymentMethod": "paypal"
    }));
    let (status, body) = send_request(req, configure(&store, gateway)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["transactionId"], "5O190127TN364715T");
    assert_eq!(body["redirectUrl"], "https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T");

    let order_id = OrderId::from(body["orderId"].as_str().unwrap());
    let order = store.order(&order_id).await;
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.customer_email, "amy@example.com");
    assert_eq!(order.artifact_name, "Gold Scalper Pro");
    assert_eq!(order.amount, Money::from(4999));
    assert_eq!(order.transaction_id.as_deref(), Some("5O190127TN364715T"));
    store.tear_down().await;
}

#[actix_web::test]
async fn mpesa_checkout_sends_the_phone_number() {
    let store = TestStore::new().await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_initiate_payment()
        .withf(|r| r.method == PaymentMethod::Mpesa && r.phone_number.as_deref() == Some("254712345678"))
        .times(1)
        .returning(|_| {
            Ok(PaymentInitiation {
                transaction_id: "ws_CO_191220191020363925".into(),
                redirect_url: None,
                message: "Check your phone to complete the payment".into(),
            })
        });
    let req = checkout_request(json!({
        "email": "ben@example.com",
        "artifactName": "Trend Rider",
        "paymentMethod": "mpesa",
        "phoneNumber": "254712345678"
    }));
    let (status, body) = send_request(req, configure(&store, gateway)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert!(body.get("redirectUrl").is_none());
    assert_eq!(body["message"], "Check your phone to complete the payment");
    let order = store.order(&OrderId::from(body["orderId"].as_str().unwrap())).await;
    assert_eq!(order.customer_phone.as_deref(), Some("254712345678"));
    assert_eq!(order.currency, "KES");
    store.tear_down().await;
}

#[actix_web::test]
async fn invalid_checkouts_are_bad_requests() {
    let store = TestStore::new().await;
    let requests = [
        json!({"email": "amy@example.com", "artifactName": "Silver Bullet", "paymentMethod": "paypal"}),
        json!({"email": "amy@example.com", "artifactName": "Trend Rider", "paymentMethod": "mpesa"}),
        json!({
            "email": "amy@example.com",
            "artifactName": "Trend Rider",
            "paymentMethod": "mpesa",
            "phoneNumber": ""
        }),
        json!({"email": "amy@example.com", "artifactName": "Gold Scalper Pro", "paymentMethod": "bitcoin"}),
        json!({"email": "amy.example.com", "artifactName": "Gold Scalper Pro", "paymentMethod": "paypal"}),
        json!({"artifactName": "Gold Scalper Pro", "paymentMethod": "paypal"}),
    ];
    for request in requests {
        // The gateway has no expectations, so it must not be asked to start a payment
        let (status, _) = send_request(checkout_request(request.clone()), configure(&store, MockGateway::new()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST, "{request} was accepted");
    }
    store.tear_down().await;
}

#[actix_web::test]
async fn refused_payment_fails_the_order() {
    let store = TestStore::new().await;
    let seen = Arc::new(Mutex::new(None::<OrderId>));
    let seen_in_mock = Arc::clone(&seen);
    let mut gateway = MockGateway::new();
    gateway.expect_initiate_payment().times(1).returning(move |r| {
        *seen_in_mock.lock().unwrap() = Some(r.order_id.clone());
        Err(GatewayError::Rejected("INVALID_CURRENCY".into()))
    });
    let req = checkout_request(json!({
        "email": "amy@example.com",
        "artifactName": "Gold Scalper Pro",
        "paymentMethod": "pesapal"
    }));
    let (status, body) = send_request(req, configure(&store, gateway)).await.unwrap();
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("INVALID_CURRENCY"));

    let order_id = seen.lock().unwrap().clone().expect("The gateway was not called");
    let order = store.order(&order_id).await;
    assert_eq!(order.status, OrderStatusType::Failed);
    assert!(order.failure_reason.unwrap().contains("INVALID_CURRENCY"));
    assert!(order.transaction_id.is_none());
    store.tear_down().await;
}
