//! Request/response wrapper over the ledger service.
//!
//! Each call maps directly to one HTTP request and one outcome. Nothing here
//! retries, caches, or touches session state; callers decide what a failure
//! means.

use std::time::Duration;

use async_trait::async_trait;
use ledger_shared::{
    domain::{Account, MutationRequest, Profile, TransactionRecord},
    error::LedgerError,
    protocol::{ErrorBody, LoginForm, LoginResponse, MutationPayload, RegisterRequest},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

const LOGIN_PATH: &str = "/login";
const USERS_PATH: &str = "/users/";
const PROFILE_PATH: &str = "/users/me";
const ACCOUNT_PATH: &str = "/users/account";
const TRANSACTIONS_PATH: &str = "/transactions/";
const DEPOSIT_PATH: &str = "/transactions/transaction";
const TRANSFER_PATH: &str = "/transactions/transfer";

const LOGIN_FAILED_MESSAGE: &str = "Login failed.";
const REGISTER_FAILED_MESSAGE: &str = "Could not create the account.";
const TRANSACTION_FAILED_MESSAGE: &str = "The transaction was rejected.";
const TOKEN_REJECTED_MESSAGE: &str = "token rejected";

#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Exchanges credentials for a bearer token.
    async fn login(&self, email: &str, password: &str) -> Result<String, LedgerError>;
    async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), LedgerError>;
    async fn fetch_profile(&self, token: &str) -> Result<Profile, LedgerError>;
    async fn fetch_account(&self, token: &str) -> Result<Account, LedgerError>;
    /// Most recent first, as the service orders them.
    async fn fetch_transactions(&self, token: &str) -> Result<Vec<TransactionRecord>, LedgerError>;
    async fn submit_transaction(
        &self,
        token: &str,
        request: &MutationRequest,
    ) -> Result<(), LedgerError>;
}

/// Which call a failed response belongs to; decides how its status maps onto
/// [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    Read,
    Submit,
}

pub fn classify_failure(
    endpoint: Endpoint,
    status: StatusCode,
    detail: Option<String>,
) -> LedgerError {
    let rejected_token = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN);
    match endpoint {
        Endpoint::Login => match detail {
            None if status.is_server_error() => {
                LedgerError::Connectivity(format!("login returned {status}"))
            }
            detail => {
                LedgerError::Authentication(detail.unwrap_or_else(|| LOGIN_FAILED_MESSAGE.into()))
            }
        },
        Endpoint::Read if rejected_token => LedgerError::Authorization(
            detail.unwrap_or_else(|| TOKEN_REJECTED_MESSAGE.into()),
        ),
        Endpoint::Read => LedgerError::Connectivity(format!("unexpected status {status}")),
        Endpoint::Submit if rejected_token => LedgerError::Authorization(
            detail.unwrap_or_else(|| TOKEN_REJECTED_MESSAGE.into()),
        ),
        Endpoint::Register | Endpoint::Submit => match detail {
            Some(message) => LedgerError::Validation(message),
            None if status.is_server_error() => {
                LedgerError::Connectivity(format!("unexpected status {status}"))
            }
            None if endpoint == Endpoint::Register => {
                LedgerError::Validation(REGISTER_FAILED_MESSAGE.into())
            }
            None => LedgerError::Validation(TRANSACTION_FAILED_MESSAGE.into()),
        },
    }
}

pub struct HttpLedgerClient {
    http: Client,
    base_url: String,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, LedgerError> {
        request.send().await.map_err(|err| {
            warn!("ledger: transport failure: {err}");
            LedgerError::Connectivity(err.to_string())
        })
    }

    async fn expect_success(
        &self,
        endpoint: Endpoint,
        response: Response,
    ) -> Result<Response, LedgerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = error_detail(response).await;
        debug!("ledger: {endpoint:?} failed status={status} detail={detail:?}");
        Err(classify_failure(endpoint, status, detail))
    }

    async fn get_authorized<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
    ) -> Result<T, LedgerError> {
        let response = self
            .send(self.http.get(self.endpoint(path)).bearer_auth(token))
            .await?;
        let response = self.expect_success(Endpoint::Read, response).await?;
        decode(response, path).await
    }
}

async fn error_detail(response: Response) -> Option<String> {
    let body = response.bytes().await.ok()?;
    serde_json::from_slice::<ErrorBody>(&body)
        .ok()?
        .message()
        .map(str::to_string)
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, LedgerError> {
    let body = response
        .bytes()
        .await
        .map_err(|err| LedgerError::Connectivity(err.to_string()))?;
    serde_json::from_slice(&body).map_err(|err| {
        warn!("ledger: malformed response from {what}: {err}");
        LedgerError::Connectivity(format!("malformed response from {what}: {err}"))
    })
}

#[async_trait]
impl LedgerApi for HttpLedgerClient {
    async fn login(&self, email: &str, password: &str) -> Result<String, LedgerError> {
        let form = LoginForm {
            username: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .send(self.http.post(self.endpoint(LOGIN_PATH)).form(&form))
            .await?;
        let response = self.expect_success(Endpoint::Login, response).await?;
        let body: LoginResponse = decode(response, LOGIN_PATH).await?;
        info!("ledger: login accepted");
        Ok(body.access_token)
    }

    async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), LedgerError> {
        let payload = RegisterRequest {
            email: email.to_string(),
            full_name: full_name.to_string(),
            password: password.to_string(),
        };
        let response = self
            .send(self.http.post(self.endpoint(USERS_PATH)).json(&payload))
            .await?;
        self.expect_success(Endpoint::Register, response).await?;
        info!("ledger: registration accepted");
        Ok(())
    }

    async fn fetch_profile(&self, token: &str) -> Result<Profile, LedgerError> {
        self.get_authorized(token, PROFILE_PATH).await
    }

    async fn fetch_account(&self, token: &str) -> Result<Account, LedgerError> {
        self.get_authorized(token, ACCOUNT_PATH).await
    }

    async fn fetch_transactions(&self, token: &str) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.get_authorized(token, TRANSACTIONS_PATH).await
    }

    async fn submit_transaction(
        &self,
        token: &str,
        request: &MutationRequest,
    ) -> Result<(), LedgerError> {
        let builder = match MutationPayload::from(request) {
            MutationPayload::Deposit(payload) => {
                self.http.post(self.endpoint(DEPOSIT_PATH)).json(&payload)
            }
            MutationPayload::Transfer(payload) => {
                self.http.post(self.endpoint(TRANSFER_PATH)).json(&payload)
            }
        };
        let response = self.send(builder.bearer_auth(token)).await?;
        self.expect_success(Endpoint::Submit, response).await?;
        info!("ledger: transaction accepted amount={}", request.amount());
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/ledger_client_tests.rs"]
mod tests;
