//! Line oriented text format of one account record
//!
//! ```text
//! Name: Alice
//! Surname: Smith
//! Phone Number: 555-1234
//! ID Number: ID1
//! Account Number: 482913
//! Password: pw1
//! Balance: 100.0
//! ```
use std::str::FromStr;

use rust_decimal::Decimal;

use super::{balance::Balance, Account};
use crate::errors::RecordErr;

const LABELS: [&str; 7] = [
    "Name",
    "Surname",
    "Phone Number",
    "ID Number",
    "Account Number",
    "Password",
    "Balance",
];

/// Decode account from record text. Labels are not checked, values are taken by position.
/// Lines after the seventh are ignored.
pub fn decode(raw: &str) -> Result<Account, RecordErr> {
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() < LABELS.len() {
        return Err(RecordErr::MissingLines(lines.len()));
    }

    let mut values = Vec::with_capacity(LABELS.len());
    for (idx, line) in lines.iter().take(LABELS.len()).enumerate() {
        let (_label, value) = line
            .split_once(':')
            .ok_or(RecordErr::MalformedLine(idx + 1))?;
        values.push(value.trim().to_owned());
    }

    let [name, surname, phone_number, id_number, account_number, password, balance]: [String; 7] =
        values
            .try_into()
            .map_err(|v: Vec<String>| RecordErr::MissingLines(v.len()))?;

    let balance = parse_balance(&balance)?;

    Ok(Account {
        name,
        surname,
        phone_number,
        id_number,
        account_number,
        password,
        balance: Balance::from(balance),
    })
}

fn parse_balance(value: &str) -> Result<Decimal, RecordErr> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| RecordErr::Balance(value.to_owned()))
}

/// Encode account into exactly seven `Label: value` lines, each terminated with `\n`
pub fn encode(account: &Account) -> String {
    let balance = account.balance().to_string();
    let values = [
        account.name.as_str(),
        account.surname.as_str(),
        account.phone_number.as_str(),
        account.id_number.as_str(),
        account.account_number.as_str(),
        account.password.as_str(),
        balance.as_str(),
    ];

    let mut out = String::with_capacity(128);
    for (label, value) in LABELS.iter().zip(values) {
        out.push_str(label);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out
}
