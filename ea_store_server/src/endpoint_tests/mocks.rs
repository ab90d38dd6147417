use ea_store_engine::traits::{
    GatewayError,
    NotificationError,
    Notifier,
    PaymentGateway,
    PaymentInitiation,
    PaymentRequest,
    PaypalCapture,
    ProviderVerdict,
    PurchaseConfirmation,
    WebhookHeaders,
};
use mockall::mock;
use serde_json::Value;

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation, GatewayError>;
        async fn verify_pesapal_transaction(&self, order_tracking_id: &str) -> Result<ProviderVerdict, GatewayError>;
        async fn verify_paypal_webhook(&self, headers: &WebhookHeaders, event: &Value) -> Result<bool, GatewayError>;
        async fn capture_paypal_order(&self, token: &str) -> Result<PaypalCapture, GatewayError>;
    }
}

mock! {
    pub Mailer {}
    impl Notifier for Mailer {
        async fn send_purchase_confirmation(&self, confirmation: &PurchaseConfirmation) -> Result<(), NotificationError>;
    }
}
