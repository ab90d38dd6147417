//! In-memory stand-ins for the engine's external collaborators.
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use eas_common::Money;
use serde_json::Value;

use crate::{
    catalog::StaticCatalog,
    traits::{
        Artifact,
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
    },
};

/// A catalog with two artifacts: "Gold Scalper Pro" (USD 49.99) and "Trend Rider" (KES 1500).
pub fn test_catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        Artifact {
            name: "Gold Scalper Pro".into(),
            version: "2.1.0".into(),
            price: Money::from(4999),
            currency: "USD".into(),
            file: "gold-scalper-pro.ex5".into(),
        },
        Artifact {
            name: "Trend Rider".into(),
            version: "1.0.3".into(),
            price: Money::from(150_000),
            currency: "KES".into(),
            file: "trend-rider.ex4".into(),
        },
    ])
}

/// Records every confirmation it is asked to send. It can be switched into failing, or made slow.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<PurchaseConfirmation>>>,
    attempts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Successful sends.
    pub fn sent(&self) -> Vec<PurchaseConfirmation> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent().len()
    }

    /// All calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    async fn send_purchase_confirmation(&self, confirmation: &PurchaseConfirmation) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Unavailable("mail server is down".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(confirmation.clone());
        }
        Ok(())
    }
}

/// A payment gateway whose answers are scripted by the test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    pesapal: Arc<Mutex<Option<ProviderVerdict>>>,
    paypal_signature_valid: Arc<AtomicBool>,
    unreachable: Arc<AtomicBool>,
    pesapal_queries: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next Pesapal status query returns `verdict`.
    pub fn set_pesapal_verdict(&self, verdict: ProviderVerdict) {
        if let Ok(mut v) = self.pesapal.lock() {
            *v = Some(verdict);
        }
    }

    pub fn set_paypal_signature_valid(&self, valid: bool) {
        self.paypal_signature_valid.store(valid, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn pesapal_queries(&self) -> usize {
        self.pesapal_queries.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), GatewayError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(GatewayError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl PaymentGateway for ScriptedGateway {
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation, GatewayError> {
        self.check_reachable()?;
        Ok(PaymentInitiation {
            transaction_id: format!("TX-{}", request.order_id),
            redirect_url: None,
            message: "initiated".into(),
        })
    }

    async fn verify_pesapal_transaction(&self, _order_tracking_id: &str) -> Result<ProviderVerdict, GatewayError> {
        self.pesapal_queries.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.pesapal
            .lock()
            .ok()
            .and_then(|v| v.clone())
            .ok_or_else(|| GatewayError::InvalidResponse("no scripted Pesapal verdict".into()))
    }

    async fn verify_paypal_webhook(&self, _headers: &WebhookHeaders, _event: &Value) -> Result<bool, GatewayError> {
        self.check_reachable()?;
        Ok(self.paypal_signature_valid.load(Ordering::SeqCst))
    }

    async fn capture_paypal_order(&self, token: &str) -> Result<PaypalCapture, GatewayError> {
        self.check_reachable()?;
        Ok(PaypalCapture {
            paypal_order_id: token.to_string(),
            completed: true,
            status: "COMPLETED".into(),
            custom_id: None,
            capture_id: Some(format!("CAP-{token}")),
            amount: None,
        })
    }
}
