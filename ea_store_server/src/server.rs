use std::{net::IpAddr, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use ea_store_engine::{
    events::EventProducers,
    CheckoutApi,
    EntitlementApi,
    FulfillmentApi,
    FulfillmentOptions,
    SqliteDatabase,
    StaticCatalog,
    WebhookNormalizer,
};
use futures::{future::ok, FutureExt};
use log::*;

use crate::{
    config::{AdminSecret, ServerConfig, ServerOptions, WebhookSecret},
    errors::ServerError,
    helpers::get_remote_ip,
    hooks::create_audit_event_handlers,
    integrations::{MailNotifier, ProviderGateway},
    routes::{
        health,
        reload_catalog,
        CheckoutRoute,
        CompleteOrderRoute,
        CustomerEntitlementsRoute,
        OrderDiagnosticsRoute,
        PaypalReturnRoute,
        RecordDownloadRoute,
        RetrySideEffectsRoute,
        WebhookIpnRoute,
        WebhookRoute,
    },
};

const MAX_DB_CONNECTIONS: u32 = 25;

/// Everything a server instance needs besides its configuration. Each worker gets its own clone.
#[derive(Clone)]
pub struct ServerComponents {
    pub db: SqliteDatabase,
    pub catalog: StaticCatalog,
    pub gateway: ProviderGateway,
    pub notifier: MailNotifier,
    pub producers: EventProducers,
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    if config.auto_migrate {
        SqliteDatabase::create_if_missing(&config.database_url)
            .await
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.auto_migrate {
        db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    } else {
        info!("🗃️ EAS_AUTO_MIGRATE is off. Assuming the database schema is up to date.");
    }
    let catalog = StaticCatalog::from_file(&config.catalog_path).map_err(|e| {
        ServerError::ConfigurationError(format!("Could not load the catalog from {}. {e}", config.catalog_path))
    })?;
    let gateway = ProviderGateway::new(&config)?;
    let notifier = MailNotifier::new(&config.mail, &config.dashboard_url)?;
    let handlers = create_audit_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let components = ServerComponents { db, catalog, gateway, notifier, producers };
    let srv = create_server_instance(config, components)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, components: ServerComponents) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let admin_secret = AdminSecret(config.admin_secret.clone());
    let webhook_secret = WebhookSecret(config.webhook_secret.clone());
    let whitelist = config.webhook_whitelist.clone();
    let fulfillment_options = FulfillmentOptions { email_timeout: config.email_timeout, ..Default::default() };
    let srv = HttpServer::new(move || {
        let ServerComponents { db, catalog, gateway, notifier, producers } = components.clone();
        let fulfillment_api = FulfillmentApi::new(db.clone(), catalog.clone(), notifier, producers.clone())
            .with_options(fulfillment_options);
        let checkout_api = CheckoutApi::new(db.clone(), producers);
        let entitlement_api = EntitlementApi::new(db.clone());
        let normalizer = WebhookNormalizer::new(gateway.clone(), db);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("eas::access_log"))
            .app_data(web::Data::new(fulfillment_api))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(entitlement_api))
            .app_data(web::Data::new(normalizer))
            .app_data(web::Data::new(catalog))
            .app_data(web::Data::new(gateway))
            .app_data(web::Data::new(options.clone()))
            .app_data(web::Data::new(admin_secret.clone()))
            .app_data(web::Data::new(webhook_secret.clone()));
        let use_x_forwarded_for = options.use_x_forwarded_for;
        let use_forwarded = options.use_forwarded;
        let whitelist = whitelist.clone();
        // Registered before `/api`, otherwise the `/api` scope would claim these requests
        let webhook_scope = web::scope("/api/webhook")
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                if is_whitelisted(peer_ip, whitelist.as_deref()) {
                    srv.call(req).boxed_local()
                } else {
                    ok::<_, actix_web::Error>(req.error_response(ServerError::ForbiddenPeer)).boxed_local()
                }
            })
            .service(WebhookRoute::<SqliteDatabase, StaticCatalog, MailNotifier, ProviderGateway>::new())
            .service(WebhookIpnRoute::<SqliteDatabase, StaticCatalog, MailNotifier, ProviderGateway>::new());
        let api_scope = web::scope("/api")
            .service(CheckoutRoute::<SqliteDatabase, StaticCatalog, ProviderGateway>::new())
            .service(CompleteOrderRoute::<SqliteDatabase, StaticCatalog, MailNotifier>::new())
            .service(RetrySideEffectsRoute::<SqliteDatabase, StaticCatalog, MailNotifier>::new())
            .service(OrderDiagnosticsRoute::<SqliteDatabase, StaticCatalog, MailNotifier>::new())
            .service(CustomerEntitlementsRoute::<SqliteDatabase>::new())
            .service(RecordDownloadRoute::<SqliteDatabase>::new())
            .service(reload_catalog)
            .service(PaypalReturnRoute::<SqliteDatabase, StaticCatalog, MailNotifier, ProviderGateway>::new());
        app.service(health).service(webhook_scope).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Without a whitelist every peer is accepted. With one, a peer whose address cannot be determined is refused.
pub fn is_whitelisted(peer_ip: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (peer_ip, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => {
            let allowed = whitelist.contains(&ip);
            if allowed {
                info!("🪝️ Payment notification from {ip}");
            } else {
                warn!("🪝️ Payment notification from {ip}, which is not whitelisted. Denying access.");
            }
            allowed
        },
        (None, Some(_)) => {
            warn!("🪝️ No IP address found in the webhook request, denying access.");
            false
        },
    }
}
