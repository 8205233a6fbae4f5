use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use ledger_shared::{
    domain::{Account, Profile, TransactionRecord},
    error::LedgerError,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::ledger_client::LedgerApi;

/// Profile, account and history fetched together by one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub generation: u64,
    pub profile: Profile,
    pub account: Account,
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied(Arc<LedgerSnapshot>),
    /// A refresh dispatched later already applied its result.
    Superseded { generation: u64 },
    /// The store was detached while the reads were in flight.
    Detached,
}

struct DisplayedState {
    snapshot: Option<Arc<LedgerSnapshot>>,
    applied_generation: u64,
    detached: bool,
}

/// Last known ledger view. Readers always see one whole snapshot.
pub struct ViewStateStore {
    api: Arc<dyn LedgerApi>,
    dispatched: AtomicU64,
    inner: Mutex<DisplayedState>,
    snapshots: watch::Sender<Option<Arc<LedgerSnapshot>>>,
}

impl ViewStateStore {
    pub fn new(api: Arc<dyn LedgerApi>) -> Self {
        let (snapshots, _) = watch::channel(None);
        Self {
            api,
            dispatched: AtomicU64::new(0),
            inner: Mutex::new(DisplayedState {
                snapshot: None,
                applied_generation: 0,
                detached: false,
            }),
            snapshots,
        }
    }

    pub async fn snapshot(&self) -> Option<Arc<LedgerSnapshot>> {
        self.inner.lock().await.snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<LedgerSnapshot>>> {
        self.snapshots.subscribe()
    }

    /// Fetches profile, account and history concurrently and swaps them in as
    /// one unit. Any failed read fails the refresh and keeps the previous
    /// snapshot on display.
    pub async fn refresh(&self, token: &str) -> Result<RefreshOutcome, LedgerError> {
        let generation = self.dispatched.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("view: refresh dispatched generation={generation}");

        let fetched = tokio::try_join!(
            self.api.fetch_profile(token),
            self.api.fetch_account(token),
            self.api.fetch_transactions(token),
        );
        let (profile, account, transactions) = match fetched {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!("view: refresh failed generation={generation}, keeping previous snapshot: {err}");
                return Err(err);
            }
        };

        let mut guard = self.inner.lock().await;
        if guard.detached {
            debug!("view: discarding refresh generation={generation} after detach");
            return Ok(RefreshOutcome::Detached);
        }
        if generation <= guard.applied_generation {
            info!(
                "view: refresh generation={generation} superseded by generation={}",
                guard.applied_generation
            );
            return Ok(RefreshOutcome::Superseded { generation });
        }

        let snapshot = Arc::new(LedgerSnapshot {
            generation,
            profile,
            account,
            transactions,
        });
        guard.applied_generation = generation;
        guard.snapshot = Some(snapshot.clone());
        self.snapshots.send_replace(Some(snapshot.clone()));
        Ok(RefreshOutcome::Applied(snapshot))
    }

    /// Drops the displayed snapshot. Refreshes already in flight are treated
    /// as superseded so they cannot bring it back.
    pub async fn clear(&self) {
        let mut guard = self.inner.lock().await;
        guard.snapshot = None;
        guard.applied_generation = self.dispatched.load(Ordering::SeqCst);
        self.snapshots.send_replace(None);
    }

    /// Marks the view as no longer displayed; late results are discarded.
    pub async fn detach(&self) {
        self.inner.lock().await.detached = true;
    }
}

#[cfg(test)]
#[path = "tests/view_state_tests.rs"]
mod tests;
