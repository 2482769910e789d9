//! Append only per account transaction log, `<account_number>_transactions.txt`
//!
//! Each line is `<timestamp> | <type> | <amount>` with local time of second resolution.

use std::{fmt, io::ErrorKind, path::PathBuf};

use chrono::{Local, NaiveDateTime};
use csv_async::{AsyncReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};
use tokio_stream::StreamExt;

use crate::{amount::Amount, errors::LedgerErr, store::is_valid_key};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Allowed transaction types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    #[serde(rename = "Transfer Out")]
    TransferOut,
    #[serde(rename = "Transfer In")]
    TransferIn,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdrawal => "Withdrawal",
            TransactionKind::TransferOut => "Transfer Out",
            TransactionKind::TransferIn => "Transfer In",
        })
    }
}

/// One parsed log line
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct LogEntry {
    #[serde(deserialize_with = "timestamp")]
    pub timestamp: NaiveDateTime,
    pub kind: TransactionKind,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(d)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
}

/// Transaction logs of all accounts stored in one directory
#[derive(Debug, Clone)]
pub struct TransactionLog {
    dir: PathBuf,
}

impl TransactionLog {
    /// Logs kept in existing directory `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `None` when `account_number` can not name a file in the log directory
    fn log_path(&self, account_number: &str) -> Option<PathBuf> {
        is_valid_key(account_number)
            .then(|| self.dir.join(format!("{account_number}_transactions.txt")))
    }

    /// Append one line to the log of `account_number`, creating the log if needed
    pub async fn append(
        &self,
        account_number: &str,
        kind: TransactionKind,
        amount: &Amount,
    ) -> Result<(), LedgerErr> {
        let path = self
            .log_path(account_number)
            .ok_or_else(|| LedgerErr::InvalidAccountNumber(account_number.to_owned()))?;

        let line = format!(
            "{} | {} | {}\n",
            Local::now().format(TIMESTAMP_FORMAT),
            kind,
            amount
        );

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        f.write_all(line.as_bytes()).await?;
        f.flush().await?;
        Ok(())
    }

    /// Every line of the log in append order, trimmed. Account without log has empty history.
    pub async fn read_all(&self, account_number: &str) -> Result<Vec<String>, LedgerErr> {
        let Some(path) = self.log_path(account_number) else {
            return Ok(Vec::new());
        };

        match fs::read_to_string(path).await {
            Ok(raw) => Ok(raw.lines().map(|l| l.trim().to_owned()).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Same as [`TransactionLog::read_all`] but parsed into [`LogEntry`]. Inspection API for
    /// callers needing typed history; no endpoint serves it.
    pub async fn read_entries(&self, account_number: &str) -> Result<Vec<LogEntry>, LedgerErr> {
        let Some(path) = self.log_path(account_number) else {
            return Ok(Vec::new());
        };

        let f = match fs::File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut builder = AsyncReaderBuilder::new();
        builder
            .delimiter(b'|')
            .has_headers(false)
            .trim(Trim::All);
        let mut rdr = builder.create_deserializer(f);

        let mut entries = Vec::new();
        let mut records = rdr.deserialize::<LogEntry>();
        while let Some(entry) = records.next().await {
            entries.push(entry?);
        }
        Ok(entries)
    }
}
