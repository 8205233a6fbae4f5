use std::path::PathBuf;

use ledger_shared::{domain::RequestError, error::LedgerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("token storage io failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("token storage file {} is not a JSON object: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Failure of a session-level action (login, registration, refresh).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No usable token; the login-required signal has already been emitted.
    #[error("login required")]
    LoginRequired,
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::LoginRequired => "Please log in.".to_string(),
            Self::Request(err) => err.to_string(),
            Self::Ledger(err) => err.user_message(),
        }
    }
}
