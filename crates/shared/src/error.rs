use thiserror::Error;

/// Shown when the service cannot be reached or answers with something that
/// cannot be understood.
pub const CONNECTIVITY_MESSAGE: &str = "Could not reach the server.";
/// Shown when the bearer token has been rejected and the user must log in again.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Failure of a single call to the ledger service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Credentials were refused at login.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The bearer token was rejected on an authenticated call.
    #[error("authorization rejected: {0}")]
    Authorization(String),
    /// The service refused the content of the request. The message is
    /// supplied by the service and shown as-is.
    #[error("request rejected: {0}")]
    Validation(String),
    /// Transport failure, timeout, or a response that could not be decoded.
    #[error("service unreachable: {0}")]
    Connectivity(String),
}

impl LedgerError {
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Authorization(_))
    }

    /// Text a presentation surface should display for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication(message) | Self::Validation(message) => message.clone(),
            Self::Authorization(_) => SESSION_EXPIRED_MESSAGE.to_string(),
            Self::Connectivity(_) => CONNECTIVITY_MESSAGE.to_string(),
        }
    }
}
