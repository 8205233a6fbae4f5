use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(TransactionId);

pub const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: String,
    pub email: String,
}

/// Account identity and balance as last reported by the service. The balance
/// is never adjusted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub number: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    #[serde(rename = "transaction_type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "data", deserialize_with = "deserialize_timestamp")]
    pub occurred_at: DateTime<Utc>,
    #[serde(
        rename = "direction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reported_direction: Option<Direction>,
}

impl TransactionRecord {
    /// Whether the record moved money into or out of the account.
    ///
    /// An explicit direction from the service wins. Otherwise only the kind is
    /// consulted, so transfers without one have no known direction.
    pub fn direction(&self) -> Option<Direction> {
        self.reported_direction.or(match self.kind {
            TransactionKind::Deposit => Some(Direction::Credit),
            TransactionKind::Withdraw => Some(Direction::Debit),
            TransactionKind::Transfer => None,
        })
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp `{raw}`")))
}

/// Accepts RFC 3339 timestamps and offset-less ISO-8601 datetimes; the latter
/// are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc())
}

/// Local rejection of user input, raised before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("amount is required")]
    MissingAmount,
    #[error("amount must be a number, got `{0}`")]
    InvalidAmount(String),
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("target account required")]
    MissingTargetAccount,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Deposit,
    Transfer { target_account_number: String },
}

/// One balance-affecting write. Only constructible through the validating
/// constructors, so an instance always has a positive amount and, for
/// transfers, a non-empty target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    kind: MutationKind,
    amount: Decimal,
    description: Option<String>,
}

impl MutationRequest {
    pub fn deposit(amount: &str, description: &str) -> Result<Self, RequestError> {
        Ok(Self {
            kind: MutationKind::Deposit,
            amount: parse_amount(amount)?,
            description: non_empty(description),
        })
    }

    pub fn transfer(
        amount: &str,
        target_account_number: &str,
        description: &str,
    ) -> Result<Self, RequestError> {
        let target_account_number =
            non_empty(target_account_number).ok_or(RequestError::MissingTargetAccount)?;
        Ok(Self {
            kind: MutationKind::Transfer {
                target_account_number,
            },
            amount: parse_amount(amount)?,
            description: non_empty(description),
        })
    }

    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target_account_number(&self) -> Option<&str> {
        match &self.kind {
            MutationKind::Deposit => None,
            MutationKind::Transfer {
                target_account_number,
            } => Some(target_account_number),
        }
    }
}

fn parse_amount(raw: &str) -> Result<Decimal, RequestError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RequestError::MissingAmount);
    }
    let amount =
        Decimal::from_str(raw).map_err(|_| RequestError::InvalidAmount(raw.to_string()))?;
    if amount <= Decimal::ZERO {
        return Err(RequestError::NonPositiveAmount);
    }
    Ok(amount)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.full_name.trim().is_empty() {
            return Err(RequestError::MissingField("full name"));
        }
        if self.email.trim().is_empty() {
            return Err(RequestError::MissingField("email"));
        }
        if self.password != self.confirm_password {
            return Err(RequestError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RequestError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
