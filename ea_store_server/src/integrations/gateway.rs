use ea_integrations::{
    data_objects::{PesapalBillingAddress, SubmitOrderRequest},
    mpesa::StkPush,
    paypal::NewPaypalOrder,
    IntegrationError,
    MpesaApi,
    PaypalApi,
    PesapalApi,
};
use ea_store_engine::{
    db_types::PaymentMethod,
    traits::{GatewayError, PaymentInitiation, PaymentRequest, PaypalCapture, ProviderVerdict, WebhookHeaders},
    PaymentGateway,
};
use eas_common::Money;
use log::*;
use serde_json::Value;

use crate::{config::ServerConfig, errors::ServerError};

pub fn gateway_error(e: IntegrationError) -> GatewayError {
    if e.is_transient() {
        return GatewayError::Unavailable(e.to_string());
    }
    match e {
        IntegrationError::Initialization(msg) => GatewayError::NotConfigured(msg),
        IntegrationError::NotConfigured(what) => GatewayError::NotConfigured(what),
        IntegrationError::RestRequestError(msg) => GatewayError::Unavailable(msg),
        IntegrationError::QueryError { status, message } => GatewayError::Rejected(format!("{status}: {message}")),
        IntegrationError::RestResponseError(msg) | IntegrationError::JsonError(msg) => {
            GatewayError::InvalidResponse(msg)
        },
        IntegrationError::Rejected(msg) => GatewayError::Rejected(msg),
        IntegrationError::InvalidPhoneNumber(phone) => {
            GatewayError::Rejected(format!("{phone} is not a valid M-Pesa phone number"))
        },
    }
}

/// The store's [`PaymentGateway`]: Pesapal, M-Pesa and PayPal behind one interface.
#[derive(Clone)]
pub struct ProviderGateway {
    pesapal: PesapalApi,
    mpesa: MpesaApi,
    paypal: PaypalApi,
    public_base_url: String,
    dashboard_url: String,
}

impl ProviderGateway {
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        let init_err = |e: IntegrationError| ServerError::InitializeError(e.to_string());
        let pesapal = PesapalApi::new(config.pesapal.clone()).map_err(init_err)?;
        let mpesa = MpesaApi::new(config.mpesa.clone()).map_err(init_err)?;
        let paypal = PaypalApi::new(config.paypal.clone()).map_err(init_err)?;
        for (name, configured) in [
            ("Pesapal", config.pesapal.is_configured()),
            ("M-Pesa", config.mpesa.is_configured()),
            ("PayPal", config.paypal.is_configured()),
        ] {
            if configured {
                info!("💳️ {name} payments are enabled");
            } else {
                warn!("💳️ {name} credentials are not configured. {name} payments will be refused.");
            }
        }
        Ok(Self {
            pesapal,
            mpesa,
            paypal,
            public_base_url: config.public_base_url.clone(),
            dashboard_url: config.dashboard_url.clone(),
        })
    }

    /// M-Pesa callbacks carry the order id in the query string, so that the callback can be matched even if the
    /// `CheckoutRequestID` was never stored.
    pub fn mpesa_callback_url(&self, request: &PaymentRequest) -> String {
        format!("{}/api/webhook?orderId={}", self.public_base_url, request.order_id)
    }

    pub fn paypal_return_url(&self) -> String {
        format!("{}/api/paypal/return", self.public_base_url)
    }

    async fn initiate_pesapal(&self, request: &PaymentRequest) -> Result<PaymentInitiation, GatewayError> {
        let submission = SubmitOrderRequest {
            id: request.order_id.to_string(),
            currency: request.currency.clone(),
            amount: request.amount.value() as f64 / 100.0,
            description: request.description.clone(),
            callback_url: self.dashboard_url.clone(),
            notification_id: self.pesapal.config().ipn_id.clone(),
            billing_address: PesapalBillingAddress {
                email_address: request.email.clone(),
                phone_number: request.phone_number.clone(),
            },
        };
        let response = self.pesapal.submit_order(&submission).await.map_err(gateway_error)?;
        let transaction_id = response
            .order_tracking_id
            .ok_or_else(|| GatewayError::InvalidResponse("Pesapal did not return an order tracking id".into()))?;
        Ok(PaymentInitiation {
            transaction_id,
            redirect_url: response.redirect_url,
            message: "Complete your payment on the Pesapal page".into(),
        })
    }

    async fn initiate_mpesa(&self, request: &PaymentRequest) -> Result<PaymentInitiation, GatewayError> {
        let phone = request
            .phone_number
            .clone()
            .ok_or_else(|| GatewayError::Rejected("A phone number is required for M-Pesa payments".into()))?;
        let push = StkPush {
            phone,
            amount: request.amount.major_units_ceil(),
            account_reference: request.order_id.to_string(),
            description: request.description.clone(),
            callback_url: self.mpesa_callback_url(request),
        };
        let response = self.mpesa.stk_push(&push).await.map_err(gateway_error)?;
        let transaction_id = response
            .checkout_request_id
            .ok_or_else(|| GatewayError::InvalidResponse("M-Pesa did not return a CheckoutRequestID".into()))?;
        let message =
            response.customer_message.unwrap_or_else(|| "Check your phone to approve the M-Pesa payment".into());
        Ok(PaymentInitiation { transaction_id, redirect_url: None, message })
    }

    async fn initiate_paypal(&self, request: &PaymentRequest) -> Result<PaymentInitiation, GatewayError> {
        let order = NewPaypalOrder {
            order_id: request.order_id.to_string(),
            amount: request.amount,
            currency: request.currency.clone(),
            description: request.description.clone(),
            return_url: self.paypal_return_url(),
            cancel_url: self.dashboard_url.clone(),
        };
        let created = self.paypal.create_order(&order).await.map_err(gateway_error)?;
        let redirect_url = created.approval_url().map(String::from);
        if redirect_url.is_none() {
            warn!("🅿️ PayPal order {} came back without an approval link", created.id);
        }
        Ok(PaymentInitiation {
            transaction_id: created.id,
            redirect_url,
            message: "Approve the payment on PayPal".into(),
        })
    }
}

impl PaymentGateway for ProviderGateway {
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation, GatewayError> {
        match request.method {
            PaymentMethod::Pesapal => self.initiate_pesapal(request).await,
            PaymentMethod::Mpesa => self.initiate_mpesa(request).await,
            PaymentMethod::Paypal => self.initiate_paypal(request).await,
        }
    }

    async fn verify_pesapal_transaction(&self, order_tracking_id: &str) -> Result<ProviderVerdict, GatewayError> {
        let status = self.pesapal.transaction_status(order_tracking_id).await.map_err(gateway_error)?;
        let amount = status.amount.and_then(|a| Money::from_major_f64(a).ok());
        Ok(ProviderVerdict {
            success: status.is_completed(),
            status: status.status_text(),
            transaction_id: status.confirmation_code.clone().filter(|c| !c.is_empty()),
            merchant_reference: status.merchant_reference.clone(),
            amount,
        })
    }

    async fn verify_paypal_webhook(&self, headers: &WebhookHeaders, event: &Value) -> Result<bool, GatewayError> {
        self.paypal.verify_webhook_signature(headers, event).await.map_err(gateway_error)
    }

    async fn capture_paypal_order(&self, token: &str) -> Result<PaypalCapture, GatewayError> {
        let order = self.paypal.capture_order(token).await.map_err(gateway_error)?;
        let capture = order.first_capture();
        let amount = capture.and_then(|c| c.amount.as_ref()).and_then(|a| a.value.parse::<Money>().ok());
        Ok(PaypalCapture {
            paypal_order_id: order.id.clone(),
            completed: order.is_completed(),
            status: order.status.clone(),
            custom_id: order.custom_id().map(String::from),
            capture_id: capture.map(|c| c.id.clone()),
            amount,
        })
    }
}
