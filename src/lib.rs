//! Simple toy banking ledger served over http, backed by one flat file per account

#![deny(missing_docs)]

pub mod account;
pub mod amount;
pub mod errors;
pub mod http;
pub mod ledger;
pub mod locks;
pub mod store;
pub mod transactions;

/// Public six digit account identifier
pub type AccountNumber = String;
/// Private storage key of an account, never written inside its record
pub type Username = String;
