//! Possible errors

use crate::amount::NonPositiveAmountErr;
use thiserror::Error;

/// Group errors for account balance
#[allow(missing_docs)]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BalanceErr {
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("amount exceeds the largest balance an account can hold")]
    Overflow,
}

/// Group errors returned when an account record can not be decoded
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordErr {
    /// Record is shorter than the fixed seven lines
    #[error("record has {0} lines, expected 7")]
    MissingLines(usize),
    /// Line (1-based) has no `:` separating label and value
    #[error("line {0} is not a `Label: value` pair")]
    MalformedLine(usize),
    /// Balance line value is not a number
    #[error("balance `{0}` is not a number")]
    Balance(String),
    /// Record file is not utf-8 text
    #[error("record is not valid utf-8")]
    NotUtf8,
}

/// Group all errors that can occurs while serving ledger operations
#[derive(Debug, Error)]
pub enum LedgerErr {
    /// No record carries the requested account number
    #[error("Account not found")]
    NotFound,
    /// Transfer source account number did not match any record
    #[error("Source account not found")]
    SourceNotFound,
    /// Transfer recipient name did not match any record
    #[error("Recipient account not found")]
    RecipientNotFound,
    /// Username is already registered
    #[error("Account already exists")]
    AlreadyExists,
    /// Unknown username or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,
    /// Username can not be used as a storage key
    #[error("invalid username `{0}`")]
    InvalidUsername(String),
    /// Account number can not be used as a storage key
    #[error("invalid account number `{0}`")]
    InvalidAccountNumber(String),
    #[allow(missing_docs)]
    #[error(transparent)]
    Balance(#[from] BalanceErr),
    #[allow(missing_docs)]
    #[error(transparent)]
    Amount(#[from] NonPositiveAmountErr),
    /// Stored record of `username` failed to decode
    #[error("record of `{username}` is corrupt: {source}")]
    Corrupt {
        #[allow(missing_docs)]
        username: String,
        #[allow(missing_docs)]
        source: RecordErr,
    },
    /// Transaction log line failed to parse
    #[error("transaction log is malformed: {0}")]
    Log(#[from] csv_async::Error),
    /// Password could not be hashed
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    /// Task running a locked update was cancelled by runtime shutdown
    #[error("ledger operation aborted")]
    Aborted,
    #[allow(missing_docs)]
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
