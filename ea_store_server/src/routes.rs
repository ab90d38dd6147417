//! Request handler definitions
//!
//! Define each route and its handler here. Every handler is a thin adapter: it checks the request, translates it
//! into a call against the engine APIs and turns the result into an HTTP response. Order state changes happen in
//! [`FulfillmentApi`] and nowhere else.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any I/O (database, payment providers, mail) must be awaited, never
//! blocked on.
use actix_web::{get, http::header, post, web, HttpRequest, HttpResponse, Responder};
use bytes::Bytes;
use ea_store_engine::{
    db_types::{NewOrder, OrderId, OrderStatusType, PaymentMethod},
    fulfillment_objects::FulfillmentReport,
    traits::{EntitlementManagement, OrderManagement, PaymentRequest},
    webhooks::{detect_provider, WebhookQuery},
    ArtifactCatalog,
    CheckoutApi,
    EntitlementApi,
    FulfillmentApi,
    FulfillmentDatabase,
    FulfillmentError,
    Notifier,
    PaymentGateway,
    PaymentProvider,
    PaymentVerdict,
    StaticCatalog,
    WebhookNormalizer,
};
use log::*;
use serde_json::Value;

use crate::{
    config::{AdminSecret, ServerOptions, WebhookSecret},
    data_objects::{
        AdminOrderQuery,
        AdminOrderRequest,
        AdminRequest,
        CheckoutRequest,
        CheckoutResponse,
        DownloadRequest,
        EntitlementsQuery,
        JsonResponse,
        ManualCompletionResponse,
        PaypalReturnQuery,
        RetryResponse,
    },
    errors::ServerError,
    helpers::{check_admin_secret, check_webhook_secret, url_with_params, webhook_headers},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// The handler's type parameters must be declared in the same order as the bounds listed in the macro call.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl OrderManagement, ArtifactCatalog, PaymentGateway);
/// Route handler for the checkout endpoint
///
/// Creates a `pending` order for the requested artifact at the catalog price and asks the chosen provider to start
/// the payment. The provider's reference (Pesapal tracking id, M-Pesa `CheckoutRequestID` or PayPal order id) is
/// stored on the order so that later notifications can be matched to it.
///
/// If the provider refuses to start the payment, the order is marked `failed` and a 502 is returned.
pub async fn checkout<B, C, G>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B>>,
    catalog: web::Data<C>,
    gateway: web::Data<G>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    C: ArtifactCatalog,
    G: PaymentGateway,
{
    let request = body.into_inner();
    debug!("💻️ POST checkout for {} ({})", request.artifact_name, request.payment_method);
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ServerError::InvalidRequestBody("A valid email address is required".into()));
    }
    let method = request.payment_method.parse::<PaymentMethod>().map_err(|e| {
        debug!("💻️ Checkout refused. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let phone_number = request.phone_number.as_deref().map(str::trim).filter(|p| !p.is_empty());
    if method == PaymentMethod::Mpesa && phone_number.is_none() {
        return Err(ServerError::InvalidRequestBody("M-Pesa payments need a phone number".into()));
    }
    let artifact = catalog.find_by_name(&request.artifact_name).ok_or_else(|| {
        debug!("💻️ Checkout refused. '{}' is not in the catalog", request.artifact_name);
        ServerError::from(FulfillmentError::ArtifactNotFound(request.artifact_name.clone()))
    })?;

    let mut new_order = NewOrder::new(
        OrderId::generate(),
        email.to_string(),
        artifact.name.clone(),
        method,
        artifact.price,
        artifact.currency.clone(),
    );
    if let Some(phone) = phone_number {
        new_order = new_order.with_phone(phone);
    }
    let order = api.create_order(new_order).await?;
    let payment = PaymentRequest {
        order_id: order.order_id.clone(),
        method,
        amount: order.amount,
        currency: order.currency.clone(),
        email: order.customer_email.clone(),
        phone_number: order.customer_phone.clone(),
        description: format!("{} v{}", artifact.name, artifact.version),
    };
    let initiation = match gateway.initiate_payment(&payment).await {
        Ok(initiation) => initiation,
        Err(e) => {
            warn!("💻️ {method} refused to start the payment for order [{}]. {e}", order.order_id);
            if let Err(err) = api.record_initiation_failure(&order.order_id, &e.to_string()).await {
                error!("💻️ Could not mark order [{}] as failed. {err}", order.order_id);
            }
            return Err(ServerError::PaymentInitiationFailed(e.to_string()));
        },
    };
    api.attach_transaction_id(&order.order_id, &initiation.transaction_id).await?;
    info!("💻️ Payment for order [{}] started with {method} ({})", order.order_id, initiation.transaction_id);
    Ok(HttpResponse::Ok().json(CheckoutResponse {
        success: true,
        order_id: order.order_id,
        redirect_url: initiation.redirect_url,
        transaction_id: initiation.transaction_id,
        message: initiation.message,
    }))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(webhook => Post "" impl FulfillmentDatabase, ArtifactCatalog, Notifier, PaymentGateway);
/// Route handler for payment notifications from all three providers
///
/// The body is normalized to a [`PaymentVerdict`] and handed to the fulfillment engine. Once a verdict has been
/// applied the provider gets a 200, even if the engine rejected the verdict because it contradicts the order's state.
/// Rejections are flagged with `success: false` and logged for an admin to review.
///
/// Generic `{orderId, status}` notifications carry no provider proof. They are only accepted with the shared webhook
/// secret in the `X-Webhook-Secret` header.
///
/// Error responses:
/// * 400 for payloads we cannot identify, that do not name an order, or that fail PayPal's signature check.
/// * 401 for a generic notification without the webhook secret.
/// * 404 if the order does not exist.
/// * 502 if the provider could not be asked to confirm the notification. Providers retry on this.
/// * 503 if the order store is unavailable.
pub async fn webhook<B, C, N, G>(
    req: HttpRequest,
    body: Bytes,
    query: web::Query<WebhookQuery>,
    secret: web::Data<WebhookSecret>,
    normalizer: web::Data<WebhookNormalizer<G, B>>,
    api: web::Data<FulfillmentApi<B, C, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    C: ArtifactCatalog,
    N: Notifier,
    G: PaymentGateway,
{
    trace!("💻️ Received webhook request: {}", String::from_utf8_lossy(&body));
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice::<Value>(&body).map_err(|e| {
            warn!("💻️ Could not deserialize webhook payload. {e}");
            ServerError::InvalidRequestBody(e.to_string())
        })?
    };
    process_notification(&req, &query, &payload, &secret, normalizer.as_ref(), api.as_ref()).await
}

route!(webhook_ipn => Get "" impl FulfillmentDatabase, ArtifactCatalog, Notifier, PaymentGateway);
/// Pesapal can be configured to deliver IPNs as GET requests, with everything on the query string.
pub async fn webhook_ipn<B, C, N, G>(
    req: HttpRequest,
    query: web::Query<WebhookQuery>,
    secret: web::Data<WebhookSecret>,
    normalizer: web::Data<WebhookNormalizer<G, B>>,
    api: web::Data<FulfillmentApi<B, C, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    C: ArtifactCatalog,
    N: Notifier,
    G: PaymentGateway,
{
    trace!("💻️ Received GET webhook request: {:?}", query.0);
    let payload = Value::Object(Default::default());
    process_notification(&req, &query, &payload, &secret, normalizer.as_ref(), api.as_ref()).await
}

async fn process_notification<B, C, N, G>(
    req: &HttpRequest,
    query: &WebhookQuery,
    payload: &Value,
    secret: &WebhookSecret,
    normalizer: &WebhookNormalizer<G, B>,
    api: &FulfillmentApi<B, C, N>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    C: ArtifactCatalog,
    N: Notifier,
    G: PaymentGateway,
{
    if detect_provider(payload, query) == Some(PaymentProvider::Generic) {
        check_webhook_secret(&secret.0, req)?;
    }
    let headers = webhook_headers(req);
    let verdict = normalizer.normalize(&headers, query, payload).await.map_err(|e| {
        warn!("💻️ Webhook notification refused. {e}");
        ServerError::from(e)
    })?;
    let report = api.complete(&verdict.order_id, &verdict).await.map_err(|e| {
        warn!("💻️ Could not apply {} notification for order [{}]. {e}", verdict.provider, verdict.order_id);
        ServerError::from(e)
    })?;
    let response = notification_ack(&report);
    Ok(HttpResponse::Ok().json(response))
}

fn notification_ack(report: &FulfillmentReport) -> JsonResponse {
    let summary = format!("Order {} is {}", report.order.order_id, report.order.status);
    match (report.status.is_rejected(), report.warning()) {
        (true, Some(warning)) => JsonResponse::failure(format!("{summary}. {warning}")),
        (true, None) => JsonResponse::failure(summary),
        (false, Some(warning)) => JsonResponse::success(format!("{summary}. {warning}")),
        (false, None) => JsonResponse::success(summary),
    }
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(complete_order => Post "/orders/complete" impl FulfillmentDatabase, ArtifactCatalog, Notifier);
/// Route handler for manual order completion
///
/// An admin marks a pending order as paid, e.g. after confirming a payment in a provider's dashboard. This goes
/// through exactly the same completion protocol as a webhook, so completing an order that is already completed is
/// harmless and only fills in missing side effects.
///
/// A partially successful completion (entitlement granted, email failed) is a 200 with a `warning` field. Completing
/// an order that has failed is refused with a 409; the order needs a manual review.
pub async fn complete_order<B, C, N>(
    body: web::Json<AdminOrderRequest>,
    secret: web::Data<AdminSecret>,
    api: web::Data<FulfillmentApi<B, C, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    C: ArtifactCatalog,
    N: Notifier,
{
    let request = body.into_inner();
    check_admin_secret(&secret.0, &request.admin_secret)?;
    info!("💻️ Manual completion requested for order [{}]", request.order_id);
    let mut verdict = PaymentVerdict::success(request.order_id.clone(), PaymentProvider::Generic);
    if let Some(tx_id) = request.transaction_id.filter(|s| !s.is_empty()) {
        verdict = verdict.with_transaction_id(tx_id);
    }
    let report = api.complete(&request.order_id, &verdict).await?;
    if report.status.is_rejected() {
        let msg = report.warning().unwrap_or_else(|| format!("Order {} cannot be completed", request.order_id));
        return Err(ServerError::Conflict(msg));
    }
    Ok(HttpResponse::Ok().json(ManualCompletionResponse::from_report(&report)))
}

route!(retry_side_effects => Post "/admin/retry" impl FulfillmentDatabase, ArtifactCatalog, Notifier);
/// Re-runs the entitlement grant and confirmation email for a completed order. Steps that already succeeded are
/// skipped, so this is always safe to call.
pub async fn retry_side_effects<B, C, N>(
    body: web::Json<AdminOrderRequest>,
    secret: web::Data<AdminSecret>,
    api: web::Data<FulfillmentApi<B, C, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    C: ArtifactCatalog,
    N: Notifier,
{
    let request = body.into_inner();
    check_admin_secret(&secret.0, &request.admin_secret)?;
    let report = api.retry_side_effects(&request.order_id).await?;
    Ok(HttpResponse::Ok().json(RetryResponse::from_report(report)))
}

route!(order_diagnostics => Get "/admin/retry" impl FulfillmentDatabase, ArtifactCatalog, Notifier);
/// Shows an order and its entitlement without changing anything.
pub async fn order_diagnostics<B, C, N>(
    query: web::Query<AdminOrderQuery>,
    secret: web::Data<AdminSecret>,
    api: web::Data<FulfillmentApi<B, C, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    C: ArtifactCatalog,
    N: Notifier,
{
    let query = query.into_inner();
    check_admin_secret(&secret.0, &query.admin_secret)?;
    debug!("💻️ GET diagnostics for order [{}]", query.order_id);
    let diagnostics = api.diagnostics(&query.order_id).await?;
    Ok(HttpResponse::Ok().json(diagnostics))
}

//----------------------------------------------   Entitlements  ----------------------------------------------------
route!(customer_entitlements => Get "/admin/entitlements" impl EntitlementManagement);
pub async fn customer_entitlements<B: EntitlementManagement>(
    query: web::Query<EntitlementsQuery>,
    secret: web::Data<AdminSecret>,
    api: web::Data<EntitlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    check_admin_secret(&secret.0, &query.admin_secret)?;
    debug!("💻️ GET entitlements for {}", query.email);
    let entitlements = api.entitlements_for_customer(&query.email).await?;
    Ok(HttpResponse::Ok().json(entitlements))
}

route!(record_download => Post "/admin/downloads" impl EntitlementManagement);
pub async fn record_download<B: EntitlementManagement>(
    body: web::Json<DownloadRequest>,
    secret: web::Data<AdminSecret>,
    api: web::Data<EntitlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    check_admin_secret(&secret.0, &request.admin_secret)?;
    let entitlement = api.record_download(&request.email, &request.entitlement_id).await?;
    Ok(HttpResponse::Ok().json(entitlement))
}

//----------------------------------------------   Catalog  ----------------------------------------------------
/// Re-reads the catalog file, so artifacts can be added or re-priced without a restart. An order that completed while
/// its artifact was missing from the catalog can then be healed with `POST /api/admin/retry`. A file that cannot be
/// read or parsed leaves the current catalog in place.
#[post("/admin/catalog/reload")]
pub async fn reload_catalog(
    body: web::Json<AdminRequest>,
    secret: web::Data<AdminSecret>,
    options: web::Data<ServerOptions>,
    catalog: web::Data<StaticCatalog>,
) -> Result<HttpResponse, ServerError> {
    check_admin_secret(&secret.0, &body.admin_secret)?;
    let count = catalog.reload_from_file(&options.catalog_path).map_err(|e| {
        warn!("💻️ Could not reload the catalog from {}. {e}", options.catalog_path);
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{count} artifacts for sale"))))
}

//----------------------------------------------   PayPal  ----------------------------------------------------
/// Flags added to the dashboard redirect when the PayPal return could not be completed cleanly.
pub mod return_flags {
    pub const MISSING_TOKEN: &str = "missing_token";
    pub const CAPTURE_FAILED: &str = "capture_failed";
    pub const ORDER_NOT_FOUND: &str = "order_not_found";
    pub const PAYMENT_FAILED: &str = "payment_failed";
    pub const MANUAL_REVIEW: &str = "manual_review";
    pub const FULFILLMENT_INCOMPLETE: &str = "fulfillment_incomplete";
    pub const FULFILLMENT_ERROR: &str = "fulfillment_error";
}

route!(paypal_return => Get "/paypal/return" impl FulfillmentDatabase, ArtifactCatalog, Notifier, PaymentGateway);
/// Route handler for the buyer's browser coming back from PayPal
///
/// The approved PayPal order is captured, matched to our order through its `custom_id` (or, failing that, through
/// the PayPal order id we stored at checkout) and completed. The buyer is always redirected to the dashboard. Any
/// problem is reported with a `warning=<flag>` query parameter, never with an error page.
pub async fn paypal_return<B, C, N, G>(
    query: web::Query<PaypalReturnQuery>,
    options: web::Data<ServerOptions>,
    gateway: web::Data<G>,
    checkout: web::Data<CheckoutApi<B>>,
    api: web::Data<FulfillmentApi<B, C, N>>,
) -> HttpResponse
where
    B: FulfillmentDatabase,
    C: ArtifactCatalog,
    N: Notifier,
    G: PaymentGateway,
{
    let dashboard = options.dashboard_url.as_str();
    let Some(token) = query.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        warn!("💻️ PayPal return without a token");
        return warning_redirect(dashboard, return_flags::MISSING_TOKEN);
    };
    debug!("💻️ PayPal return for PayPal order {token}");
    let capture = match gateway.capture_paypal_order(token).await {
        Ok(capture) => capture,
        Err(e) => {
            warn!("💻️ Could not capture PayPal order {token}. {e}");
            // The webhook may have beaten us to it, in which case the order is already paid.
            return match checkout.fetch_order_by_transaction_id(token).await {
                Ok(Some(order)) if order.status == OrderStatusType::Completed => {
                    success_redirect(dashboard, &order.order_id)
                },
                _ => warning_redirect(dashboard, return_flags::CAPTURE_FAILED),
            };
        },
    };
    let order_id = match capture.custom_id.as_deref().filter(|s| !s.is_empty()) {
        Some(id) => OrderId::from(id),
        None => {
            debug!("💻️ PayPal order {token} has no custom_id. Looking the order up by transaction id.");
            match checkout.fetch_order_by_transaction_id(token).await {
                Ok(Some(order)) => order.order_id,
                Ok(None) => {
                    warn!("💻️ No order matches PayPal order {token}");
                    return warning_redirect(dashboard, return_flags::ORDER_NOT_FOUND);
                },
                Err(e) => {
                    error!("💻️ Could not look up the order for PayPal order {token}. {e}");
                    return warning_redirect(dashboard, return_flags::FULFILLMENT_ERROR);
                },
            }
        },
    };
    let verdict = if capture.completed {
        let mut verdict = PaymentVerdict::success(order_id.clone(), PaymentProvider::Paypal)
            .with_transaction_id(capture.capture_id.clone().unwrap_or_else(|| capture.paypal_order_id.clone()));
        if let Some(amount) = capture.amount {
            verdict = verdict.with_amount(amount);
        }
        verdict
    } else {
        let reason = format!("PayPal capture status is {}", capture.status);
        PaymentVerdict::failure(order_id.clone(), PaymentProvider::Paypal, reason)
            .with_transaction_id(capture.paypal_order_id.clone())
    };
    match api.complete(&order_id, &verdict).await {
        Ok(report) if report.status.is_rejected() => warning_redirect(dashboard, return_flags::MANUAL_REVIEW),
        Ok(_) if !verdict.is_success() => warning_redirect(dashboard, return_flags::PAYMENT_FAILED),
        Ok(report) if report.warning().is_some() => {
            warning_redirect(dashboard, return_flags::FULFILLMENT_INCOMPLETE)
        },
        Ok(report) => success_redirect(dashboard, &report.order.order_id),
        Err(FulfillmentError::OrderNotFound(id)) => {
            warn!("💻️ PayPal order {token} names order [{id}], which does not exist");
            warning_redirect(dashboard, return_flags::ORDER_NOT_FOUND)
        },
        Err(e) => {
            error!("💻️ Could not complete order [{order_id}] after PayPal return. {e}");
            warning_redirect(dashboard, return_flags::FULFILLMENT_ERROR)
        },
    }
}

fn success_redirect(dashboard: &str, order_id: &OrderId) -> HttpResponse {
    redirect(url_with_params(dashboard, &[("payment", "success"), ("orderId", order_id.as_str())]))
}

fn warning_redirect(dashboard: &str, flag: &str) -> HttpResponse {
    redirect(url_with_params(dashboard, &[("warning", flag)]))
}

fn redirect(location: String) -> HttpResponse {
    HttpResponse::Found().insert_header((header::LOCATION, location)).finish()
}
