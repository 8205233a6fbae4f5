use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ledger_core::{
    load_settings, LedgerSession, LoginRequiredReason, MutationController, MutationForm,
    MutationPhase, RefreshOutcome, SessionEvent, SubmitOutcome,
};
use ledger_shared::domain::RegistrationForm;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "ledger", about = "Command-line client for the ledger service")]
struct Args {
    /// Service base URL, overriding ledger.toml and LEDGER_API_URL.
    #[arg(long)]
    api_url: Option<String>,
    /// Where the session token is kept between runs.
    #[arg(long)]
    token_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Defaults to `--password`.
        #[arg(long)]
        confirm_password: Option<String>,
    },
    Logout,
    /// Refresh and print profile, balance and recent transactions.
    Show {
        #[arg(long)]
        json: bool,
    },
    Deposit {
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Transfer {
        #[arg(long)]
        amount: String,
        #[arg(long = "to")]
        target_account: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings()?;
    if let Some(url) = args.api_url {
        settings.api_base_url = url;
    }
    if let Some(path) = args.token_path {
        settings.token_path = path;
    }
    settings.validate()?;
    debug!("cli: using {} token={}", settings.api_base_url, settings.token_path.display());

    let ledger = LedgerSession::from_settings(&settings)?;
    let mut events = ledger.subscribe_events();
    let result = run(&ledger, args.command).await;
    ledger.teardown().await;

    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::LoginRequired(LoginRequiredReason::LoggedOut) | SessionEvent::LoggedIn => {}
            SessionEvent::LoginRequired(_) => {
                eprintln!("Please log in: ledger login --email <email> --password <password>");
            }
        }
    }
    result
}

async fn run(ledger: &LedgerSession, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            if let Err(err) = ledger.login(&email, &password).await {
                bail!(err.user_message());
            }
            println!("Logged in.");
        }
        Command::Register {
            full_name,
            email,
            confirm_password,
            password,
        } => {
            let form = RegistrationForm {
                full_name,
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
            };
            if let Err(err) = ledger.register(&form).await {
                bail!(err.user_message());
            }
            println!("Account created. You can now log in.");
        }
        Command::Logout => {
            ledger.logout().await;
            println!("Logged out.");
        }
        Command::Show { json } => {
            if let Err(err) = ledger.refresh().await {
                bail!(err.user_message());
            }
            let Some(snapshot) = ledger.view().snapshot().await else {
                bail!("no ledger data available");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&render::to_json(&snapshot))?);
            } else {
                print!("{}", render::render_snapshot(&snapshot));
            }
        }
        Command::Deposit {
            amount,
            description,
        } => {
            let form = ledger.deposit_form();
            form.set_fields(MutationForm {
                amount,
                description,
                ..MutationForm::default()
            })
            .await;
            submit(&form).await?;
        }
        Command::Transfer {
            amount,
            target_account,
            description,
        } => {
            let form = ledger.transfer_form();
            form.set_fields(MutationForm {
                amount,
                target_account_number: target_account,
                description,
            })
            .await;
            submit(&form).await?;
        }
    }
    Ok(())
}

async fn submit(form: &MutationController) -> Result<()> {
    let outcome = form.submit().await;
    let phase = form.phase().await;
    match outcome {
        SubmitOutcome::Succeeded { refresh } => {
            if let MutationPhase::Succeeded { message } = phase {
                println!("{message}");
            }
            match refresh {
                Ok(RefreshOutcome::Applied(snapshot)) => {
                    print!("{}", render::render_snapshot(&snapshot))
                }
                Ok(_) => {}
                Err(err) => eprintln!("Balance may be out of date: {}", err.user_message()),
            }
            Ok(())
        }
        SubmitOutcome::Rejected => bail!("a submission is already in progress"),
        SubmitOutcome::Discarded => bail!("the form was closed before the result arrived"),
        SubmitOutcome::Invalid(_) | SubmitOutcome::LoginRequired | SubmitOutcome::Failed(_) => {
            match phase {
                MutationPhase::Failed { message } => bail!(message),
                other => bail!("submission failed ({other:?})"),
            }
        }
    }
}
