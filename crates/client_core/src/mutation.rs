//! Deposit and transfer forms.
//!
//! A [`MutationController`] owns one form and walks it through
//! `Idle -> Submitting -> Succeeded | Failed -> Idle`. Entering `Submitting` is
//! a check-and-set under the form lock, which is what keeps a form to a single
//! submission in flight.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use ledger_shared::{
    domain::{MutationRequest, RequestError},
    error::{LedgerError, SESSION_EXPIRED_MESSAGE},
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    ledger_client::LedgerApi,
    session_store::{LoginRequiredReason, SessionStore},
    view_state::{RefreshOutcome, ViewStateStore},
};

pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(1500);
pub const DEPOSIT_SUCCESS_MESSAGE: &str = "Deposit completed.";
pub const TRANSFER_SUCCESS_MESSAGE: &str = "Transfer sent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Deposit,
    Transfer,
}

/// Raw field contents as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationForm {
    pub amount: String,
    pub target_account_number: String,
    pub description: String,
}

impl MutationForm {
    fn to_request(&self, kind: FormKind) -> Result<MutationRequest, RequestError> {
        match kind {
            FormKind::Deposit => MutationRequest::deposit(&self.amount, &self.description),
            FormKind::Transfer => MutationRequest::transfer(
                &self.amount,
                &self.target_account_number,
                &self.description,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationPhase {
    Idle,
    Submitting,
    Succeeded { message: String },
    Failed { message: String },
}

impl MutationPhase {
    fn is_settled(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A submission is already in flight (or its success is still shown);
    /// nothing was sent.
    Rejected,
    /// Local validation failed; nothing was sent.
    Invalid(RequestError),
    /// No token; nothing was sent and the login-required signal was emitted.
    LoginRequired,
    Failed(LedgerError),
    /// The service accepted the mutation. `refresh` is the outcome of the view
    /// refresh that followed it.
    Succeeded {
        refresh: Result<RefreshOutcome, LedgerError>,
    },
    /// The form was closed while the submission was in flight. The form
    /// ignored the result.
    Discarded,
}

struct FormState {
    phase: MutationPhase,
    fields: MutationForm,
    /// Bumped by every accepted submit and every close. Results and reset
    /// timers only apply to the epoch they started in.
    epoch: u64,
}

struct ControllerInner {
    kind: FormKind,
    api: Arc<dyn LedgerApi>,
    session: Arc<SessionStore>,
    view: Arc<ViewStateStore>,
    reset_delay: Duration,
    state: Mutex<FormState>,
    phases: watch::Sender<MutationPhase>,
}

impl ControllerInner {
    fn publish(&self, state: &FormState) {
        self.phases.send_replace(state.phase.clone());
    }
}

#[derive(Clone)]
pub struct MutationController {
    inner: Arc<ControllerInner>,
}

impl MutationController {
    pub fn new(
        kind: FormKind,
        api: Arc<dyn LedgerApi>,
        session: Arc<SessionStore>,
        view: Arc<ViewStateStore>,
        reset_delay: Duration,
    ) -> Self {
        let (phases, _) = watch::channel(MutationPhase::Idle);
        Self {
            inner: Arc::new(ControllerInner {
                kind,
                api,
                session,
                view,
                reset_delay,
                state: Mutex::new(FormState {
                    phase: MutationPhase::Idle,
                    fields: MutationForm::default(),
                    epoch: 0,
                }),
                phases,
            }),
        }
    }

    pub fn kind(&self) -> FormKind {
        self.inner.kind
    }

    pub async fn phase(&self) -> MutationPhase {
        self.inner.state.lock().await.phase.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MutationPhase> {
        self.inner.phases.subscribe()
    }

    pub async fn fields(&self) -> MutationForm {
        self.inner.state.lock().await.fields.clone()
    }

    pub async fn set_fields(&self, fields: MutationForm) {
        self.inner.state.lock().await.fields = fields;
    }

    /// Submits the current fields. Never returns an error: every failure is
    /// reflected in the form phase and in the returned outcome.
    pub async fn submit(&self) -> SubmitOutcome {
        let (request, epoch) = {
            let mut state = self.inner.state.lock().await;
            if matches!(
                state.phase,
                MutationPhase::Submitting | MutationPhase::Succeeded { .. }
            ) {
                debug!(
                    "mutation: {:?} submit ignored while {:?}",
                    self.inner.kind, state.phase
                );
                return SubmitOutcome::Rejected;
            }
            state.epoch += 1;
            match state.fields.to_request(self.inner.kind) {
                Ok(request) => {
                    state.phase = MutationPhase::Submitting;
                    self.inner.publish(&state);
                    (request, state.epoch)
                }
                Err(err) => {
                    debug!("mutation: {:?} rejected locally: {err}", self.inner.kind);
                    state.phase = MutationPhase::Failed {
                        message: err.to_string(),
                    };
                    self.inner.publish(&state);
                    let epoch = state.epoch;
                    drop(state);
                    self.schedule_reset(epoch);
                    return SubmitOutcome::Invalid(err);
                }
            }
        };

        let Some(token) = self.inner.session.token().await else {
            self.inner
                .session
                .require_login(LoginRequiredReason::MissingToken);
            let message = SESSION_EXPIRED_MESSAGE.to_string();
            if !self.settle(epoch, MutationPhase::Failed { message }).await {
                return SubmitOutcome::Discarded;
            }
            return SubmitOutcome::LoginRequired;
        };

        info!(
            "mutation: submitting {:?} amount={}",
            self.inner.kind,
            request.amount()
        );
        if let Err(err) = self.inner.api.submit_transaction(&token, &request).await {
            warn!("mutation: {:?} failed: {err}", self.inner.kind);
            self.inner.session.observe_failure(&token, &err).await;
            let message = err.user_message();
            if !self.settle(epoch, MutationPhase::Failed { message }).await {
                return SubmitOutcome::Discarded;
            }
            return SubmitOutcome::Failed(err);
        }

        let still_open = self.mark_succeeded(epoch).await;

        // The service changed state, so the shared view refreshes even when
        // this form has been closed meanwhile.
        let refresh = self.inner.view.refresh(&token).await;
        if let Err(err) = &refresh {
            self.inner.session.observe_failure(&token, err).await;
        }

        if !still_open {
            return SubmitOutcome::Discarded;
        }
        self.schedule_reset(epoch);
        SubmitOutcome::Succeeded { refresh }
    }

    /// Closes the form: clears fields and messages and returns to `Idle`. An
    /// in-flight submission keeps the form busy until it resolves, and its
    /// result is then ignored by the form.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        state.epoch += 1;
        state.fields = MutationForm::default();
        if state.phase != MutationPhase::Submitting {
            state.phase = MutationPhase::Idle;
        }
        self.inner.publish(&state);
    }

    async fn mark_succeeded(&self, epoch: u64) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            state.phase = MutationPhase::Idle;
            self.inner.publish(&state);
            return false;
        }
        state.fields.amount.clear();
        state.fields.description.clear();
        state.fields.target_account_number.clear();
        state.phase = MutationPhase::Succeeded {
            message: success_message(self.inner.kind).to_string(),
        };
        self.inner.publish(&state);
        true
    }

    /// Moves the form to a final phase for `epoch`. Returns `false` when the
    /// form was closed in the meantime, in which case it goes back to `Idle`.
    async fn settle(&self, epoch: u64, phase: MutationPhase) -> bool {
        {
            let mut state = self.inner.state.lock().await;
            if state.epoch != epoch {
                state.phase = MutationPhase::Idle;
                self.inner.publish(&state);
                return false;
            }
            state.phase = phase;
            self.inner.publish(&state);
        }
        self.schedule_reset(epoch);
        true
    }

    fn schedule_reset(&self, epoch: u64) {
        let inner: Weak<ControllerInner> = Arc::downgrade(&self.inner);
        let delay = self.inner.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut state = inner.state.lock().await;
            if state.epoch == epoch && state.phase.is_settled() {
                state.phase = MutationPhase::Idle;
                inner.publish(&state);
            }
        });
    }
}

fn success_message(kind: FormKind) -> &'static str {
    match kind {
        FormKind::Deposit => DEPOSIT_SUCCESS_MESSAGE,
        FormKind::Transfer => TRANSFER_SUCCESS_MESSAGE,
    }
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
