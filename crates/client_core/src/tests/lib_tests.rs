use ledger_shared::error::LedgerError;
use tokio::sync::broadcast::error::TryRecvError;

use super::*;
use crate::{
    mutation::DEFAULT_RESET_DELAY,
    test_support::{sample_account, Call, FakeLedger, Reply},
};

fn session_with(fake: &Arc<FakeLedger>, storage: MemoryTokenStorage) -> LedgerSession {
    LedgerSession::new(fake.clone(), Arc::new(storage), DEFAULT_RESET_DELAY)
}

fn registration(password: &str, confirm: &str) -> RegistrationForm {
    RegistrationForm {
        full_name: "Ana Souza".into(),
        email: "ana@example.com".into(),
        password: password.into(),
        confirm_password: confirm.into(),
    }
}

#[tokio::test]
async fn login_stores_token_and_announces_it() {
    let fake = FakeLedger::new();
    let ledger = session_with(&fake, MemoryTokenStorage::default());
    let mut events = ledger.subscribe_events();

    ledger.login(" a@b.com ", "secret").await.expect("login");

    assert!(ledger.is_authenticated().await);
    assert_eq!(ledger.session().token().await, Some("token-1".to_string()));
    assert_eq!(events.try_recv().expect("event"), SessionEvent::LoggedIn);
    assert_eq!(
        fake.calls().await,
        vec![Call::Login {
            email: "a@b.com".to_string()
        }]
    );
}

#[tokio::test]
async fn wrong_credentials_show_server_message_without_redirect() {
    let fake = FakeLedger::new();
    *fake.login_result.lock().await =
        Err(LedgerError::Authentication("Incorrect credentials".to_string()));
    let ledger = session_with(&fake, MemoryTokenStorage::default());
    let mut events = ledger.subscribe_events();

    let err = ledger.login("a@b.com", "wrong").await.expect_err("must fail");

    assert_eq!(err.user_message(), "Incorrect credentials");
    assert!(!ledger.is_authenticated().await);
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn login_requires_both_fields_locally() {
    let fake = FakeLedger::new();
    let ledger = session_with(&fake, MemoryTokenStorage::default());

    let err = ledger.login("a@b.com", "").await.expect_err("no password");
    assert_eq!(err, SessionError::Request(RequestError::MissingField("password")));
    assert!(fake.calls().await.is_empty());
}

#[tokio::test]
async fn registration_is_checked_locally_before_remote_call() {
    let fake = FakeLedger::new();
    let ledger = session_with(&fake, MemoryTokenStorage::default());

    let err = ledger
        .register(&registration("abcd", "abce"))
        .await
        .expect_err("mismatch");
    assert_eq!(err, SessionError::Request(RequestError::PasswordMismatch));
    assert!(fake.calls().await.is_empty());

    *fake.register_result.lock().await =
        Err(LedgerError::Validation("Email already registered.".to_string()));
    let err = ledger
        .register(&registration("abcd", "abcd"))
        .await
        .expect_err("duplicate");
    assert_eq!(err.user_message(), "Email already registered.");

    *fake.register_result.lock().await = Ok(());
    ledger
        .register(&registration("abcd", "abcd"))
        .await
        .expect("registered");
    assert!(!ledger.is_authenticated().await);
}

#[tokio::test]
async fn refresh_without_token_requires_login() {
    let fake = FakeLedger::new();
    let ledger = session_with(&fake, MemoryTokenStorage::default());
    let mut events = ledger.subscribe_events();

    assert_eq!(ledger.refresh().await, Err(SessionError::LoginRequired));
    assert_eq!(fake.read_count().await, 0);
    assert_eq!(
        events.try_recv().expect("event"),
        SessionEvent::LoginRequired(LoginRequiredReason::MissingToken)
    );
}

#[tokio::test]
async fn rejected_token_on_refresh_logs_out_but_keeps_view() {
    let fake = FakeLedger::new();
    let ledger = session_with(&fake, MemoryTokenStorage::with_token("token-1"));
    ledger.refresh().await.expect("first refresh");
    let mut events = ledger.subscribe_events();

    *fake.profile.lock().await = Err(LedgerError::Authorization("expired".to_string()));
    let err = ledger.refresh().await.expect_err("rejected");

    assert_eq!(
        err,
        SessionError::Ledger(LedgerError::Authorization("expired".to_string()))
    );
    assert!(!ledger.is_authenticated().await);
    assert!(ledger.view().snapshot().await.is_some());
    assert_eq!(
        events.try_recv().expect("event"),
        SessionEvent::LoginRequired(LoginRequiredReason::TokenRejected)
    );
}

#[tokio::test]
async fn late_rejection_of_old_token_keeps_newer_login() {
    let fake = FakeLedger::new();
    *fake.login_result.lock().await = Ok("new-token".to_string());
    let (reply, release) =
        Reply::gated(Err(LedgerError::Authorization("expired".to_string())));
    fake.scripted_accounts.lock().await.push_back(reply);
    let storage = Arc::new(MemoryTokenStorage::with_token("old-token"));
    let ledger = LedgerSession::new(fake.clone(), storage.clone(), DEFAULT_RESET_DELAY);
    let mut events = ledger.subscribe_events();

    let (refreshed, ()) = tokio::join!(ledger.refresh(), async {
        ledger.login("a@b.com", "secret").await.expect("login");
        release.send(()).expect("release account read");
    });

    assert!(refreshed.is_err());
    assert_eq!(ledger.session().token().await, Some("new-token".to_string()));
    assert_eq!(storage.load().expect("load"), Some("new-token".to_string()));
    assert_eq!(events.try_recv().expect("event"), SessionEvent::LoggedIn);
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn teardown_discards_refresh_in_flight() {
    let fake = FakeLedger::new();
    let (reply, release) = Reply::gated(Ok(sample_account("90.00")));
    fake.scripted_accounts.lock().await.push_back(reply);
    let ledger = session_with(&fake, MemoryTokenStorage::with_token("token-1"));

    let (refreshed, ()) = tokio::join!(ledger.refresh(), async {
        ledger.teardown().await;
        release.send(()).expect("release account read");
    });

    assert_eq!(refreshed, Ok(RefreshOutcome::Detached));
    assert!(ledger.view().snapshot().await.is_none());
    assert!(ledger.is_authenticated().await);
}

#[tokio::test]
async fn logout_clears_token_and_view() {
    let fake = FakeLedger::new();
    let ledger = session_with(&fake, MemoryTokenStorage::with_token("token-1"));
    ledger.refresh().await.expect("refresh");
    let mut events = ledger.subscribe_events();

    ledger.logout().await;

    assert!(!ledger.is_authenticated().await);
    assert!(ledger.view().snapshot().await.is_none());
    assert_eq!(
        events.try_recv().expect("event"),
        SessionEvent::LoginRequired(LoginRequiredReason::LoggedOut)
    );
}

#[tokio::test]
async fn forms_refresh_the_shared_view() {
    let fake = FakeLedger::new();
    let ledger = session_with(&fake, MemoryTokenStorage::with_token("token-1"));
    ledger.refresh().await.expect("refresh");
    *fake.account.lock().await = Ok(sample_account("162.50"));

    let transfer = ledger.transfer_form();
    assert_eq!(transfer.kind(), FormKind::Transfer);
    transfer
        .set_fields(MutationForm {
            amount: "12.50".into(),
            target_account_number: "654321".into(),
            description: String::new(),
        })
        .await;
    assert!(matches!(
        transfer.submit().await,
        SubmitOutcome::Succeeded { refresh: Ok(_) }
    ));

    let shown = ledger.view().snapshot().await.expect("snapshot");
    assert_eq!(shown.generation, 2);
    assert_eq!(shown.account.balance, sample_account("162.50").balance);
    assert_eq!(ledger.deposit_form().kind(), FormKind::Deposit);
}
