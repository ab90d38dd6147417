use std::fmt::Display;

use ea_store_engine::{
    db_types::OrderId,
    fulfillment_objects::{FulfillmentReport, SideEffectOutcome},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//----------------------------------------------   Checkout  ----------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub email: String,
    pub artifact_name: String,
    /// `pesapal`, `mpesa` or `paypal`
    pub payment_method: String,
    /// Required for M-Pesa.
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub order_id: OrderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub transaction_id: String,
    pub message: String,
}

//----------------------------------------------   Admin  ----------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderRequest {
    pub order_id: OrderId,
    pub admin_secret: String,
    /// Manual completions may record the provider reference the admin saw.
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRequest {
    pub admin_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderQuery {
    pub order_id: OrderId,
    pub admin_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualCompletionResponse {
    pub success: bool,
    pub message: String,
    pub order_id: OrderId,
    pub email: String,
    pub artifact_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ManualCompletionResponse {
    pub fn from_report(report: &FulfillmentReport) -> Self {
        Self {
            success: true,
            message: format!("Order {} is {}", report.order.order_id, report.order.status),
            order_id: report.order.order_id.clone(),
            email: report.order.customer_email.clone(),
            artifact_name: report.order.artifact_name.clone(),
            warning: report.warning(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryResponse {
    pub success: bool,
    pub message: String,
    pub order_id: OrderId,
    pub ea_delivered: bool,
    pub email_sent: bool,
    pub entitlement: SideEffectOutcome,
    pub email: SideEffectOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RetryResponse {
    pub fn from_report(report: FulfillmentReport) -> Self {
        let warning = report.warning();
        let success = warning.is_none();
        let message = if success {
            format!("Order {} is fully delivered", report.order.order_id)
        } else {
            format!("Order {} still has undelivered side effects", report.order.order_id)
        };
        Self {
            success,
            message,
            order_id: report.order.order_id,
            ea_delivered: report.order.ea_delivered,
            email_sent: report.order.email_sent,
            entitlement: report.entitlement,
            email: report.email,
            warning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementsQuery {
    pub email: String,
    pub admin_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub email: String,
    pub entitlement_id: String,
    pub admin_secret: String,
}

//----------------------------------------------   PayPal  ----------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaypalReturnQuery {
    /// The PayPal order id
    pub token: Option<String>,
    #[serde(rename = "PayerID")]
    pub payer_id: Option<String>,
}
