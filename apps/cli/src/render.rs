use std::fmt::Write as _;

use ledger_core::LedgerSnapshot;
use ledger_shared::domain::{Direction, TransactionKind, TransactionRecord};
use serde_json::{json, Value};

pub fn render_snapshot(snapshot: &LedgerSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} <{}>",
        snapshot.profile.full_name, snapshot.profile.email
    );
    let _ = writeln!(out, "Account {}", snapshot.account.number);
    let _ = writeln!(out, "Balance: {:.2}", snapshot.account.balance);
    let _ = writeln!(out);

    if snapshot.transactions.is_empty() {
        let _ = writeln!(out, "No transactions yet.");
        return out;
    }
    let _ = writeln!(out, "Recent transactions:");
    for record in &snapshot.transactions {
        let _ = writeln!(out, "  {}", render_record(record));
    }
    out
}

fn render_record(record: &TransactionRecord) -> String {
    let label = match record.kind {
        TransactionKind::Deposit => "Deposit",
        TransactionKind::Withdraw => "Withdrawal",
        TransactionKind::Transfer => "Transfer",
    };
    let sign = match record.direction() {
        Some(Direction::Credit) => '+',
        Some(Direction::Debit) => '-',
        None => ' ',
    };
    let description = if record.description.is_empty() {
        "(no description)"
    } else {
        record.description.as_str()
    };
    format!(
        "{}  {label:<10} {sign}{:>10.2}  {description}",
        record.occurred_at.format("%Y-%m-%d %H:%M"),
        record.amount,
    )
}

pub fn to_json(snapshot: &LedgerSnapshot) -> Value {
    json!({
        "profile": snapshot.profile,
        "account": snapshot.account,
        "transactions": snapshot.transactions,
    })
}
