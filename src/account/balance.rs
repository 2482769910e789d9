use crate::{amount::Amount, errors::BalanceErr};
use rust_decimal::Decimal;

/// Represents current account balance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balance {
    available: Decimal,
}

impl Balance {
    pub fn deposit(&mut self, amount: &Amount) -> Result<(), BalanceErr> {
        self.available = self
            .available
            .checked_add(**amount)
            .ok_or(BalanceErr::Overflow)?;
        Ok(())
    }

    pub fn try_withdraw(&mut self, amount: &Amount) -> Result<(), BalanceErr> {
        if self.available < **amount {
            return Err(BalanceErr::InsufficientFunds);
        }

        self.available = self
            .available
            .checked_sub(**amount)
            .ok_or(BalanceErr::Overflow)?;
        Ok(())
    }

    pub fn available(&self) -> Decimal {
        self.available
    }
}

impl From<Decimal> for Balance {
    fn from(available: Decimal) -> Self {
        Self { available }
    }
}
