use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use eas_common::Money;
use log::error;
use rand::{distributions::Uniform, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    /// Generates a fresh order id of the form `ORD-<unix millis>-<6 upper-case alphanumerics>`.
    pub fn generate() -> Self {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let millis = Utc::now().timestamp_millis();
        let mut rng = rand::thread_rng();
        let suffix: String =
            (0..6).map(|_| CHARSET[rng.sample(Uniform::from(0..CHARSET.len()))] as char).collect();
        Self(format!("ORD-{millis}-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been created and payment has been initiated, but no verdict has been applied yet.
    Pending,
    /// A success verdict was applied. Terminal.
    Completed,
    /// A failure verdict was applied, or the gateway refused the payment initiation. Terminal.
    Failed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Completed => write!(f, "completed"),
            OrderStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to pending");
            OrderStatusType::Pending
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Pesapal,
    Mpesa,
    Paypal,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Pesapal => write!(f, "pesapal"),
            PaymentMethod::Mpesa => write!(f, "mpesa"),
            PaymentMethod::Paypal => write!(f, "paypal"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pesapal" => Ok(Self::Pesapal),
            "mpesa" | "m-pesa" => Ok(Self::Mpesa),
            "paypal" => Ok(Self::Paypal),
            s => Err(ConversionError(format!("Unsupported payment method: {s}"))),
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub artifact_name: String,
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub currency: String,
    pub status: OrderStatusType,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub ea_delivered: bool,
    pub ea_delivery_error: Option<String>,
    pub email_sent: bool,
    pub email_error: Option<String>,
    pub email_claimed_at: Option<DateTime<Utc>>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub artifact_name: String,
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(
        order_id: OrderId,
        customer_email: String,
        artifact_name: String,
        payment_method: PaymentMethod,
        amount: Money,
        currency: String,
    ) -> Self {
        Self {
            order_id,
            customer_email: customer_email.trim().to_string(),
            customer_phone: None,
            artifact_name,
            payment_method,
            amount,
            currency,
            created_at: Utc::now(),
        }
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.customer_phone = Some(phone.into());
        self
    }
}

//--------------------------------------       Customer        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     Entitlement       ---------------------------------------------------------
/// A customer's right to download an artifact. There is at most one of these per order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Entitlement {
    pub id: String,
    pub customer_id: i64,
    pub artifact_id: String,
    pub artifact_name: String,
    pub order_id: OrderId,
    pub purchase_date: DateTime<Utc>,
    pub version: String,
    pub download_count: i64,
    pub last_downloaded: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewEntitlement {
    pub artifact_id: String,
    pub artifact_name: String,
    pub order_id: OrderId,
    pub version: String,
    pub purchase_date: DateTime<Utc>,
}

impl NewEntitlement {
    pub fn new(artifact_name: &str, version: &str, order_id: OrderId) -> Self {
        Self {
            artifact_id: artifact_id_for_name(artifact_name),
            artifact_name: artifact_name.to_string(),
            order_id,
            version: version.to_string(),
            purchase_date: Utc::now(),
        }
    }

    /// The composite key, `<artifact_id>-<order_id>`. Set-union semantics on entitlements hang off this value.
    pub fn entitlement_id(&self) -> String {
        format!("{}-{}", self.artifact_id, self.order_id.as_str())
    }
}

/// Derives a stable artifact id from its display name: lower-cased, runs of whitespace become `-`, and anything
/// outside `[a-z0-9-]` is dropped.
pub fn artifact_id_for_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}
