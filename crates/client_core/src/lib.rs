//! Client-side session and ledger view orchestration.
//!
//! [`LedgerSession`] owns the bearer token and the displayed
//! [`ViewStateStore`], and hands out [`MutationController`]s for the deposit
//! and transfer forms. All remote calls go through a [`LedgerApi`].

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use ledger_shared::domain::{RegistrationForm, RequestError};
use tokio::sync::broadcast;
use tracing::info;

pub mod config;
pub mod error;
pub mod ledger_client;
pub mod mutation;
pub mod session_store;
pub mod view_state;

pub use config::{load_settings, Settings};
pub use error::{SessionError, StorageError};
pub use ledger_client::{HttpLedgerClient, LedgerApi};
pub use mutation::{FormKind, MutationController, MutationForm, MutationPhase, SubmitOutcome};
pub use session_store::{
    FileTokenStorage, LoginRequiredReason, MemoryTokenStorage, SessionEvent, SessionStore,
    TokenStorage,
};
pub use view_state::{LedgerSnapshot, RefreshOutcome, ViewStateStore};

pub struct LedgerSession {
    api: Arc<dyn LedgerApi>,
    session: Arc<SessionStore>,
    view: Arc<ViewStateStore>,
    reset_delay: Duration,
}

impl LedgerSession {
    pub fn new(
        api: Arc<dyn LedgerApi>,
        storage: Arc<dyn TokenStorage>,
        reset_delay: Duration,
    ) -> Self {
        Self {
            view: Arc::new(ViewStateStore::new(api.clone())),
            session: Arc::new(SessionStore::new(storage)),
            api,
            reset_delay,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api = HttpLedgerClient::with_timeout(&settings.api_base_url, settings.request_timeout())
            .context("failed to build ledger http client")?;
        Ok(Self::new(
            Arc::new(api),
            Arc::new(FileTokenStorage::new(&settings.token_path)),
            settings.reset_delay(),
        ))
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn view(&self) -> &Arc<ViewStateStore> {
        &self.view
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.token().await.is_some()
    }

    /// On failure nothing is stored and no redirect is signalled; the error's
    /// message is meant to be shown on the login screen.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        if email.trim().is_empty() {
            return Err(RequestError::MissingField("email").into());
        }
        if password.is_empty() {
            return Err(RequestError::MissingField("password").into());
        }
        let token = self.api.login(email.trim(), password).await?;
        self.view.clear().await;
        self.session.set_token(token).await;
        info!("session: logged in");
        Ok(())
    }

    pub async fn register(&self, form: &RegistrationForm) -> Result<(), SessionError> {
        form.validate()?;
        self.api
            .register(form.full_name.trim(), form.email.trim(), &form.password)
            .await?;
        info!("session: account registered");
        Ok(())
    }

    pub async fn logout(&self) {
        self.session.clear().await;
        self.view.clear().await;
        self.session.require_login(LoginRequiredReason::LoggedOut);
    }

    /// Refreshes the displayed view with the current token. A failed refresh
    /// leaves the previous snapshot in place.
    pub async fn refresh(&self) -> Result<RefreshOutcome, SessionError> {
        let Some(token) = self.session.token_or_require_login().await else {
            return Err(SessionError::LoginRequired);
        };
        match self.view.refresh(&token).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.session.observe_failure(&token, &err).await;
                Err(err.into())
            }
        }
    }

    /// Called when the ledger view stops being displayed. Refreshes still in
    /// flight resolve as [`RefreshOutcome::Detached`] and leave the view alone.
    pub async fn teardown(&self) {
        self.view.detach().await;
    }

    pub fn deposit_form(&self) -> MutationController {
        self.form(FormKind::Deposit)
    }

    pub fn transfer_form(&self) -> MutationController {
        self.form(FormKind::Transfer)
    }

    fn form(&self, kind: FormKind) -> MutationController {
        MutationController::new(
            kind,
            self.api.clone(),
            self.session.clone(),
            self.view.clone(),
            self.reset_delay,
        )
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
