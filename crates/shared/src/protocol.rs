use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{MutationKind, MutationRequest, TransactionKind};

/// Sent with deposits submitted without a description.
pub const DEFAULT_DEPOSIT_DESCRIPTION: &str = "Deposit via app";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositPayload {
    pub amount: Decimal,
    pub transaction_type: TransactionKind,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    pub target_account_number: String,
    pub amount: Decimal,
    pub description: String,
}

/// Wire body for a validated mutation, tagged by the endpoint it goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationPayload {
    Deposit(DepositPayload),
    Transfer(TransferPayload),
}

impl From<&MutationRequest> for MutationPayload {
    fn from(request: &MutationRequest) -> Self {
        match request.kind() {
            MutationKind::Deposit => Self::Deposit(DepositPayload {
                amount: request.amount(),
                transaction_type: TransactionKind::Deposit,
                description: request
                    .description()
                    .unwrap_or(DEFAULT_DEPOSIT_DESCRIPTION)
                    .to_string(),
            }),
            MutationKind::Transfer {
                target_account_number,
            } => Self::Transfer(TransferPayload {
                target_account_number: target_account_number.clone(),
                amount: request.amount(),
                description: request.description().unwrap_or_default().to_string(),
            }),
        }
    }
}

/// Error body returned by the service. `detail` is usually a string but may be
/// a structured validation report, which is not shown to users.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<&str> {
        self.detail
            .as_ref()?
            .as_str()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}
