//! Account record and its text codec
use crate::{amount::Amount, errors::BalanceErr, AccountNumber, Username};
use rust_decimal::Decimal;

pub(crate) mod balance;
pub mod password;
pub mod record;

use balance::Balance;

/// One customer account as persisted in its record file
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Account {
    pub name: String,
    pub surname: String,
    pub phone_number: String,
    pub id_number: String,
    pub account_number: AccountNumber,
    /// argon2 PHC string, or plaintext for records written before hashing
    pub password: String,
    balance: Balance,
}

impl Account {
    /// Create new account with zero balance
    pub fn open(profile: Profile, account_number: AccountNumber, password: String) -> Self {
        Self {
            name: profile.name,
            surname: profile.surname,
            phone_number: profile.phone_number,
            id_number: profile.id_number,
            account_number,
            password,
            balance: Balance::default(),
        }
    }

    /// Current balance
    pub fn balance(&self) -> Decimal {
        self.balance.available()
    }

    /// Increase balance by `amount`. Balance is unchanged on error.
    pub fn deposit(&mut self, amount: &Amount) -> Result<(), BalanceErr> {
        self.balance.deposit(amount)
    }

    /// Decrease balance by `amount`. Balance is unchanged on error.
    pub fn try_withdraw(&mut self, amount: &Amount) -> Result<(), BalanceErr> {
        self.balance.try_withdraw(amount)
    }
}

/// Personal details given at registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Profile {
    pub name: String,
    pub surname: String,
    pub phone_number: String,
    pub id_number: String,
}

/// Decoded account together with the storage key it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct StoredAccount {
    pub username: Username,
    pub account: Account,
}
