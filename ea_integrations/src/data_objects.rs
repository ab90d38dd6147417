//! Request and response bodies for the provider APIs. Field names follow each provider's documentation.
use serde::{Deserialize, Serialize};

//----------------------------------------------   Pesapal  ----------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PesapalTokenResponse {
    pub token: Option<String>,
    #[serde(rename = "expiryDate")]
    pub expiry_date: Option<String>,
    pub error: Option<PesapalError>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PesapalError {
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl PesapalError {
    pub fn describe(&self) -> String {
        self.message.clone().or_else(|| self.code.clone()).unwrap_or_else(|| "unknown error".to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PesapalBillingAddress {
    pub email_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOrderRequest {
    /// Our order id. Pesapal calls it the merchant reference.
    pub id: String,
    pub currency: String,
    /// Major units, e.g. `49.99`.
    pub amount: f64,
    pub description: String,
    pub callback_url: String,
    pub notification_id: String,
    pub billing_address: PesapalBillingAddress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOrderResponse {
    pub order_tracking_id: Option<String>,
    pub merchant_reference: Option<String>,
    pub redirect_url: Option<String>,
    pub error: Option<PesapalError>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PesapalTransactionStatus {
    pub payment_method: Option<String>,
    pub amount: Option<f64>,
    pub confirmation_code: Option<String>,
    pub payment_status_description: Option<String>,
    pub description: Option<String>,
    pub message: Option<String>,
    /// 0 invalid, 1 completed, 2 failed, 3 reversed.
    pub status_code: Option<i64>,
    pub merchant_reference: Option<String>,
    pub currency: Option<String>,
    pub error: Option<PesapalError>,
}

impl PesapalTransactionStatus {
    pub const COMPLETED: i64 = 1;

    pub fn is_completed(&self) -> bool {
        self.status_code == Some(Self::COMPLETED)
    }

    pub fn status_text(&self) -> String {
        self.payment_status_description
            .clone()
            .or_else(|| self.status_code.map(|c| format!("status code {c}")))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

//----------------------------------------------   M-Pesa   ----------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MpesaTokenResponse {
    pub access_token: String,
    /// Daraja sends this as a string.
    pub expires_in: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    /// Whole shillings.
    pub amount: i64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    pub response_code: Option<String>,
    pub response_description: Option<String>,
    pub customer_message: Option<String>,
}

impl StkPushResponse {
    pub fn is_accepted(&self) -> bool {
        self.response_code.as_deref() == Some("0")
    }
}

//----------------------------------------------   PayPal   ----------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PaypalTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaypalAmount {
    pub currency_code: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaypalLink {
    pub href: String,
    pub rel: String,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaypalOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub links: Vec<PaypalLink>,
    #[serde(default)]
    pub purchase_units: Vec<PaypalPurchaseUnit>,
}

impl PaypalOrder {
    /// The URL the buyer is sent to in order to approve the payment.
    pub fn approval_url(&self) -> Option<&str> {
        self.links.iter().find(|l| l.rel == "approve" || l.rel == "payer-action").map(|l| l.href.as_str())
    }

    /// Our order id, as stored in `custom_id` when the PayPal order was created.
    pub fn custom_id(&self) -> Option<&str> {
        self.purchase_units.iter().find_map(|u| {
            u.custom_id
                .as_deref()
                .or_else(|| u.payments.as_ref().and_then(|p| p.captures.iter().find_map(|c| c.custom_id.as_deref())))
        })
    }

    pub fn first_capture(&self) -> Option<&PaypalCaptureDetail> {
        self.purchase_units.iter().find_map(|u| u.payments.as_ref().and_then(|p| p.captures.first()))
    }

    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaypalPurchaseUnit {
    pub reference_id: Option<String>,
    pub custom_id: Option<String>,
    pub amount: Option<PaypalAmount>,
    pub payments: Option<PaypalPayments>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaypalPayments {
    #[serde(default)]
    pub captures: Vec<PaypalCaptureDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaypalCaptureDetail {
    pub id: String,
    pub status: String,
    pub custom_id: Option<String>,
    pub amount: Option<PaypalAmount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyWebhookSignatureRequest {
    pub auth_algo: String,
    pub cert_url: String,
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
    pub webhook_id: String,
    pub webhook_event: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyWebhookSignatureResponse {
    pub verification_status: String,
}

//-----------------------------------------------   Mail   -----------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}
