use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use ledger_shared::{
    domain::{
        parse_timestamp, Account, MutationRequest, Profile, TransactionId, TransactionKind,
        TransactionRecord,
    },
    error::LedgerError,
};
use rust_decimal::Decimal;
use tokio::sync::{oneshot, Mutex, Notify};

use crate::ledger_client::LedgerApi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Login { email: String },
    Register { email: String },
    FetchProfile,
    FetchAccount,
    FetchTransactions,
    Submit(MutationRequest),
}

/// Scripted reply that can be held back until the test releases it.
pub(crate) struct Reply<T> {
    pub result: Result<T, LedgerError>,
    pub gate: Option<oneshot::Receiver<()>>,
}

impl<T> Reply<T> {
    pub fn gated(result: Result<T, LedgerError>) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                result,
                gate: Some(rx),
            },
            tx,
        )
    }
}

pub(crate) struct FakeLedger {
    pub calls: Mutex<Vec<Call>>,
    pub login_result: Mutex<Result<String, LedgerError>>,
    pub register_result: Mutex<Result<(), LedgerError>>,
    pub profile: Mutex<Result<Profile, LedgerError>>,
    pub account: Mutex<Result<Account, LedgerError>>,
    pub transactions: Mutex<Result<Vec<TransactionRecord>, LedgerError>>,
    pub submit_result: Mutex<Result<(), LedgerError>>,
    /// Consumed before `account` is used, one per fetch.
    pub scripted_accounts: Mutex<VecDeque<Reply<Account>>>,
    pub submit_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub submit_started: Notify,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            login_result: Mutex::new(Ok("token-1".to_string())),
            register_result: Mutex::new(Ok(())),
            profile: Mutex::new(Ok(sample_profile())),
            account: Mutex::new(Ok(sample_account("150.00"))),
            transactions: Mutex::new(Ok(sample_transactions())),
            submit_result: Mutex::new(Ok(())),
            scripted_accounts: Mutex::new(VecDeque::new()),
            submit_gate: Mutex::new(None),
            submit_started: Notify::new(),
        })
    }

    pub async fn hold_submit(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.submit_gate.lock().await = Some(rx);
        tx
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().await.iter().filter(|call| matches(call)).count()
    }

    pub async fn submit_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Submit(_))).await
    }

    pub async fn read_count(&self) -> usize {
        self.count(|call| {
            matches!(
                call,
                Call::FetchProfile | Call::FetchAccount | Call::FetchTransactions
            )
        })
        .await
    }

    async fn record(&self, call: Call) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl LedgerApi for FakeLedger {
    async fn login(&self, email: &str, _password: &str) -> Result<String, LedgerError> {
        self.record(Call::Login {
            email: email.to_string(),
        })
        .await;
        self.login_result.lock().await.clone()
    }

    async fn register(
        &self,
        _full_name: &str,
        email: &str,
        _password: &str,
    ) -> Result<(), LedgerError> {
        self.record(Call::Register {
            email: email.to_string(),
        })
        .await;
        self.register_result.lock().await.clone()
    }

    async fn fetch_profile(&self, _token: &str) -> Result<Profile, LedgerError> {
        self.record(Call::FetchProfile).await;
        self.profile.lock().await.clone()
    }

    async fn fetch_account(&self, _token: &str) -> Result<Account, LedgerError> {
        self.record(Call::FetchAccount).await;
        let scripted = self.scripted_accounts.lock().await.pop_front();
        match scripted {
            Some(reply) => {
                if let Some(gate) = reply.gate {
                    let _ = gate.await;
                }
                reply.result
            }
            None => self.account.lock().await.clone(),
        }
    }

    async fn fetch_transactions(&self, _token: &str) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.record(Call::FetchTransactions).await;
        self.transactions.lock().await.clone()
    }

    async fn submit_transaction(
        &self,
        _token: &str,
        request: &MutationRequest,
    ) -> Result<(), LedgerError> {
        self.record(Call::Submit(request.clone())).await;
        self.submit_started.notify_one();
        let gate = self.submit_gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.submit_result.lock().await.clone()
    }
}

pub(crate) fn sample_profile() -> Profile {
    Profile {
        full_name: "Ana Souza".to_string(),
        email: "a@b.com".to_string(),
    }
}

pub(crate) fn sample_account(balance: &str) -> Account {
    Account {
        number: "123456".to_string(),
        balance: balance.parse::<Decimal>().expect("balance"),
    }
}

pub(crate) fn sample_transactions() -> Vec<TransactionRecord> {
    vec![TransactionRecord {
        id: TransactionId(1),
        kind: TransactionKind::Deposit,
        amount: Decimal::new(15000, 2),
        description: "Deposit via app".to_string(),
        occurred_at: parse_timestamp("2025-03-01T10:15:00Z").expect("timestamp"),
        reported_direction: None,
    }]
}
