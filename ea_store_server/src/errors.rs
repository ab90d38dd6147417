use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use ea_store_engine::{FulfillmentError, WebhookError};
use serde_json::json;
use thiserror::Error;

const MIGRATION_HINT: &str = "has the database been migrated?";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Invalid credentials")]
    Unauthorized,
    #[error("Requests from this address are not accepted")]
    ForbiddenPeer,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    OrderNotCompleted(String),
    #[error("{0}")]
    Conflict(String),
    #[error("The order store is unavailable. {0}")]
    StoreUnavailable(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Unrecognized notification. {0}")]
    UnrecognizedNotification(String),
    #[error("The notification signature is invalid. {0}")]
    InvalidSignature(String),
    #[error("Could not verify the notification with the payment provider. {0}")]
    VerificationFailed(String),
    #[error("The payment could not be started. {0}")]
    PaymentInitiationFailed(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::ForbiddenPeer => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::OrderNotCompleted(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnrecognizedNotification(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::VerificationFailed(_) => StatusCode::BAD_GATEWAY,
            Self::PaymentInitiationFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({ "success": false, "error": self.to_string() });
        match self {
            Self::StoreUnavailable(_) => body["hint"] = json!(MIGRATION_HINT),
            Self::BackendError(details) => body["details"] = json!(details),
            _ => {},
        }
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

impl From<FulfillmentError> for ServerError {
    fn from(e: FulfillmentError) -> Self {
        match e {
            FulfillmentError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            FulfillmentError::EntitlementNotFound(_) => Self::NoRecordFound(e.to_string()),
            FulfillmentError::OrderAlreadyExists(_) => Self::Conflict(e.to_string()),
            FulfillmentError::ArtifactNotFound(_) => Self::InvalidRequestBody(e.to_string()),
            FulfillmentError::OrderNotCompleted(_, _) => Self::OrderNotCompleted(e.to_string()),
            FulfillmentError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
            FulfillmentError::DatabaseError(msg) => Self::BackendError(msg),
            FulfillmentError::NotificationFailed(msg) => Self::BackendError(msg),
        }
    }
}

impl From<WebhookError> for ServerError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::MissingOrderReference => Self::UnrecognizedNotification(e.to_string()),
            WebhookError::UnrecognizedPayload(_) => Self::UnrecognizedNotification(e.to_string()),
            WebhookError::InvalidSignature(msg) => Self::InvalidSignature(msg),
            WebhookError::ReferenceMismatch(_) => Self::UnrecognizedNotification(e.to_string()),
            WebhookError::VerificationFailed(msg) => Self::VerificationFailed(msg),
            WebhookError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}
