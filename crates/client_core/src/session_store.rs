//! Bearer token ownership and persistence.
//!
//! [`SessionStore`] keeps the single token every authenticated call reads.
//! Persistence goes through [`TokenStorage`] so the medium can be swapped;
//! [`FileTokenStorage`] keeps it in a JSON object under [`TOKEN_STORAGE_KEY`].

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex as StdMutex, PoisonError},
};

use ledger_shared::error::LedgerError;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::error::StorageError;

/// Key the token is persisted under.
pub const TOKEN_STORAGE_KEY: &str = "token";

pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn store(&self, token: &str) -> Result<(), StorageError>;
    fn remove(&self) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryTokenStorage {
    slot: StdMutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: StdMutex::new(Some(token.into())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store(&self, token: &str) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// JSON object file shared with other client-side keys; only
/// [`TOKEN_STORAGE_KEY`] is touched.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Map<String, Value>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let raw = serde_json::to_string_pretty(entries).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, raw).map_err(io_err)
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .read_entries()?
            .get(TOKEN_STORAGE_KEY)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn store(&self, token: &str) -> Result<(), StorageError> {
        let mut entries = self.read_entries()?;
        entries.insert(TOKEN_STORAGE_KEY.to_string(), Value::from(token));
        self.write_entries(&entries)
    }

    fn remove(&self) -> Result<(), StorageError> {
        let mut entries = self.read_entries()?;
        if entries.remove(TOKEN_STORAGE_KEY).is_none() {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRequiredReason {
    MissingToken,
    TokenRejected,
    LoggedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    /// The presentation surface should route the user to the login screen.
    LoginRequired(LoginRequiredReason),
}

pub struct SessionStore {
    storage: Arc<dyn TokenStorage>,
    token: RwLock<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Loads any persisted token. An unreadable store starts the session
    /// logged out.
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let token = storage.load().unwrap_or_else(|err| {
            warn!("session: ignoring unreadable token storage: {err}");
            None
        });
        let (events, _) = broadcast::channel(64);
        Self {
            storage,
            token: RwLock::new(token),
            events,
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: String) {
        let mut current = self.token.write().await;
        if let Err(err) = self.storage.store(&token) {
            warn!("session: token kept in memory only: {err}");
        }
        *current = Some(token);
        drop(current);
        let _ = self.events.send(SessionEvent::LoggedIn);
    }

    pub async fn clear(&self) {
        let mut current = self.token.write().await;
        self.remove_persisted();
        current.take();
    }

    fn remove_persisted(&self) {
        if let Err(err) = self.storage.remove() {
            warn!("session: failed to remove persisted token: {err}");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn require_login(&self, reason: LoginRequiredReason) {
        info!("session: login required reason={reason:?}");
        let _ = self.events.send(SessionEvent::LoginRequired(reason));
    }

    /// Current token, or emits the login-required signal when there is none.
    pub async fn token_or_require_login(&self) -> Option<String> {
        let token = self.token().await;
        if token.is_none() {
            self.require_login(LoginRequiredReason::MissingToken);
        }
        token
    }

    /// Applies the stale-token policy: an authorization failure ends the
    /// session, but only while `token` (the one the failed call carried) is
    /// still the current one.
    pub(crate) async fn observe_failure(&self, token: &str, err: &LedgerError) {
        if !err.is_authorization() {
            return;
        }
        {
            let mut current = self.token.write().await;
            if current.as_deref() != Some(token) {
                debug!("session: ignoring rejection of a token no longer in use");
                return;
            }
            warn!("session: token rejected by service, clearing session");
            self.remove_persisted();
            current.take();
        }
        self.require_login(LoginRequiredReason::TokenRejected);
    }
}

#[cfg(test)]
#[path = "tests/session_store_tests.rs"]
mod tests;
