//! Types shared between the ledger client core and its presentation surfaces:
//! the domain snapshot types, the request shapes sent to the ledger service,
//! and the error taxonomy for remote calls.

pub mod domain;
pub mod error;
pub mod protocol;
