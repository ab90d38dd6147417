use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("{0} is not configured")]
    NotConfigured(String),
    #[error("Could not reach the remote service: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The request was refused: {0}")]
    Rejected(String),
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),
}

impl IntegrationError {
    /// True if the remote service could not be reached or answered with a server error, i.e. the same request might
    /// succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            IntegrationError::RestRequestError(_) => true,
            IntegrationError::QueryError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
