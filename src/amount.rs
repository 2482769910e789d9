//! Protect before using zero or negative amount for deposits, withdraws and transfers.

use std::{borrow::Borrow, fmt, ops::Deref};

use rust_decimal::Decimal;
use thiserror::Error;

/// Represent strictly positive financial amount of money
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount(Decimal);

impl Amount {
    /// Create new amount `num * 10^-scale`. `num` must not be zero.
    pub fn new(num: u64, scale: u32) -> Amount {
        debug_assert!(num != 0, "amount must be positive");
        let inner = Decimal::from_i128_with_scale(num.into(), scale);
        Self(inner)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("amount must be greater than zero")]
/// represent error when operation want to move zero or negative amount of money
pub struct NonPositiveAmountErr;

impl TryFrom<Decimal> for Amount {
    type Error = NonPositiveAmountErr;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.is_sign_negative() || value.is_zero() {
            Err(NonPositiveAmountErr)
        } else {
            Ok(Self(value))
        }
    }
}

impl From<Amount> for Decimal {
    fn from(this: Amount) -> Self {
        this.0
    }
}

impl Borrow<Decimal> for Amount {
    fn borrow(&self) -> &Decimal {
        &self.0
    }
}

impl Deref for Amount {
    type Target = Decimal;
    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
