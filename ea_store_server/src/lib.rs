//! # EA Store server
//!
//! The HTTP front end of the EA storefront. It is responsible for:
//! * Creating orders and handing them to a payment provider (Pesapal, M-Pesa STK push or PayPal).
//! * Receiving provider notifications, reducing them to a payment verdict and passing the verdict to the fulfillment
//!   engine.
//! * Giving admins a way to complete orders manually, re-run failed side effects and inspect orders.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/checkout`: Creates an order and starts the payment.
//! * `/api/webhook`: Payment notifications from every provider.
//! * `/api/paypal/return`: Where PayPal sends the buyer after approving a payment.
//! * `/api/orders/complete`, `/api/admin/*`: Admin operations. These require the admin secret.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod hooks;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
