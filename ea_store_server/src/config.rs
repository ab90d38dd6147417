use std::{env, net::IpAddr, time::Duration};

use ea_integrations::{MailConfig, MpesaConfig, PaypalConfig, PesapalConfig};
use eas_common::{helpers::parse_boolean_flag, Secret};
use log::*;

const DEFAULT_EAS_HOST: &str = "127.0.0.1";
const DEFAULT_EAS_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/ea_store.db";
const DEFAULT_CATALOG_PATH: &str = "data/catalog.json";
const DEFAULT_EMAIL_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Create and migrate the database on start-up.
    pub auto_migrate: bool,
    pub admin_secret: Secret<String>,
    /// Shared secret that generic (non-provider) payment notifications must carry in the `X-Webhook-Secret` header.
    pub webhook_secret: Secret<String>,
    /// The externally visible URL of the store, e.g. `https://eas.example.com`. Provider callbacks are built from it.
    pub public_base_url: String,
    /// Where customers are sent after a PayPal payment.
    pub dashboard_url: String,
    pub catalog_path: String,
    pub email_timeout: Duration,
    /// If supplied, requests against the webhook endpoint are checked against this list of IP addresses.
    pub webhook_whitelist: Option<Vec<IpAddr>>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    pub pesapal: PesapalConfig,
    pub mpesa: MpesaConfig,
    pub paypal: PaypalConfig,
    pub mail: MailConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let public_base_url = format!("http://{DEFAULT_EAS_HOST}:{DEFAULT_EAS_PORT}");
        Self {
            host: DEFAULT_EAS_HOST.to_string(),
            port: DEFAULT_EAS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auto_migrate: true,
            admin_secret: Secret::default(),
            webhook_secret: Secret::default(),
            dashboard_url: format!("{public_base_url}/dashboard"),
            public_base_url,
            catalog_path: DEFAULT_CATALOG_PATH.to_string(),
            email_timeout: Duration::from_secs(DEFAULT_EMAIL_TIMEOUT_SECS),
            webhook_whitelist: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
            pesapal: PesapalConfig::default(),
            mpesa: MpesaConfig::default(),
            paypal: PaypalConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("EAS_HOST").ok().unwrap_or_else(|| DEFAULT_EAS_HOST.into());
        let port = env::var("EAS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for EAS_PORT. {e} Using the default, {DEFAULT_EAS_PORT}, instead."
                    );
                    DEFAULT_EAS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_EAS_PORT);
        let database_url = env::var("EAS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ EAS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auto_migrate = parse_boolean_flag(env::var("EAS_AUTO_MIGRATE").ok(), true);
        let admin_secret = Secret::new(env::var("EAS_ADMIN_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ EAS_ADMIN_SECRET is not set. Every admin request will be refused until it is.");
            String::default()
        }));
        let webhook_secret = Secret::new(env::var("EAS_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            info!("🪛️ EAS_WEBHOOK_SECRET is not set. Generic payment notifications will be refused.");
            String::default()
        }));
        let public_base_url = env::var("EAS_PUBLIC_BASE_URL")
            .ok()
            .unwrap_or_else(|| {
                let url = format!("http://{host}:{port}");
                warn!("🪛️ EAS_PUBLIC_BASE_URL is not set. Payment providers will be told to call back to {url}.");
                url
            })
            .trim_end_matches('/')
            .to_string();
        let dashboard_url =
            env::var("EAS_DASHBOARD_URL").ok().unwrap_or_else(|| format!("{public_base_url}/dashboard"));
        let catalog_path = env::var("EAS_CATALOG_PATH").ok().unwrap_or_else(|| {
            info!("🪛️ EAS_CATALOG_PATH is not set. Using {DEFAULT_CATALOG_PATH}.");
            DEFAULT_CATALOG_PATH.to_string()
        });
        let email_timeout = configure_email_timeout();
        let webhook_whitelist = configure_whitelist();
        let use_x_forwarded_for = parse_boolean_flag(env::var("EAS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("EAS_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            auto_migrate,
            admin_secret,
            webhook_secret,
            public_base_url,
            dashboard_url,
            catalog_path,
            email_timeout,
            webhook_whitelist,
            use_x_forwarded_for,
            use_forwarded,
            pesapal: PesapalConfig::new_from_env_or_default(),
            mpesa: MpesaConfig::new_from_env_or_default(),
            paypal: PaypalConfig::new_from_env_or_default(),
            mail: MailConfig::new_from_env_or_default(),
        }
    }
}

fn configure_email_timeout() -> Duration {
    env::var("EAS_EMAIL_TIMEOUT_SECS")
        .map_err(|_| {
            info!("🪛️ EAS_EMAIL_TIMEOUT_SECS is not set. Using the default value of {DEFAULT_EMAIL_TIMEOUT_SECS}s.")
        })
        .and_then(|s| {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| warn!("🪛️ Invalid configuration value for EAS_EMAIL_TIMEOUT_SECS. {e}"))
        })
        .ok()
        .unwrap_or(Duration::from_secs(DEFAULT_EMAIL_TIMEOUT_SECS))
}

fn configure_whitelist() -> Option<Vec<IpAddr>> {
    let whitelist = env::var("EAS_WEBHOOK_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The webhook IP whitelist was configured, but is empty. The server will run, but won't accept any \
                 payment notifications."
            );
        },
        None => {
            info!("🪛️ No webhook IP whitelist is set. Notifications are authenticated by the providers' checks only.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Webhook IP whitelist: {addrs}");
        },
    }
    whitelist
}

/// `none`, `false` and `0` disable the whitelist. Invalid entries are skipped.
pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        return None;
    }
    let ip_addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in EAS_WEBHOOK_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that route handlers need. Secrets are not included. The admin
/// secret travels separately as [`AdminSecret`].
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub public_base_url: String,
    pub dashboard_url: String,
    /// Re-read by the catalog reload route.
    pub catalog_path: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            public_base_url: config.public_base_url.clone(),
            dashboard_url: config.dashboard_url.clone(),
            catalog_path: config.catalog_path.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AdminSecret(pub Secret<String>);

#[derive(Clone, Debug, Default)]
pub struct WebhookSecret(pub Secret<String>);
