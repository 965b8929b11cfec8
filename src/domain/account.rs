use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

pub type AccountId = String;

/// Signed monetary value held by an account.
///
/// This is a wrapper around `rust_decimal::Decimal`; it may be fractional and,
/// for balances that were seeded that way, negative. The service never makes
/// it negative through a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// Represents a strictly positive monetary amount for a balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(BankError::InvalidTransactionAmount)
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = BankError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// An account holding a monetary balance.
///
/// The identifier is immutable once created. The balance only changes through
/// `BankService::create_transaction`, which stages the mutated copy inside a
/// storage scope; nothing in the process holds the authoritative value.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub balance: Balance,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, name: impl Into<String>, balance: Balance) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            balance,
        }
    }

    /// Adds funds to the balance.
    ///
    /// Fails with `BalanceOverflow` if the result does not fit in a `Decimal`;
    /// the balance is left unchanged.
    pub fn deposit(&mut self, amount: Amount) -> Result<()> {
        let balance = self
            .balance
            .0
            .checked_add(amount.value())
            .ok_or_else(|| BankError::BalanceOverflow(self.id.clone()))?;
        self.balance = Balance(balance);
        Ok(())
    }

    /// Removes funds if the balance covers the amount.
    pub fn withdraw(&mut self, amount: Amount) -> Result<()> {
        let amount: Balance = amount.into();
        if amount > self.balance {
            return Err(BankError::InsufficientBalance);
        }
        self.balance -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10.0));
        let b2 = Balance::new(dec!(5.0));
        assert_eq!(b1 + b2, Balance::new(dec!(15.0)));
        assert_eq!(b1 - b2, Balance::new(dec!(5.0)));
    }

    #[test]
    fn test_balance_display_is_normalized() {
        assert_eq!(Balance::new(dec!(1000.00)).to_string(), "1000");
        assert_eq!(Balance::new(dec!(0.5000)).to_string(), "0.5");
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(BankError::InvalidTransactionAmount)
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(BankError::InvalidTransactionAmount)
        ));
    }

    #[test]
    fn test_account_deposit() {
        let mut account = Account::new("A", "Alice", Balance::ZERO);
        account.deposit(Amount::new(dec!(10.5)).unwrap()).unwrap();
        assert_eq!(account.balance, Balance::new(dec!(10.5)));
    }

    #[test]
    fn test_account_deposit_overflow() {
        let mut account = Account::new("A", "Alice", Balance::new(Decimal::MAX));
        let result = account.deposit(Amount::new(dec!(1)).unwrap());
        assert!(matches!(result, Err(BankError::BalanceOverflow(id)) if id == "A"));
        assert_eq!(account.balance, Balance::new(Decimal::MAX));
    }

    #[test]
    fn test_account_withdraw_exact_balance() {
        let mut account = Account::new("A", "Alice", Balance::new(dec!(10.0)));
        account.withdraw(Amount::new(dec!(10.0)).unwrap()).unwrap();
        assert_eq!(account.balance, Balance::ZERO);
    }

    #[test]
    fn test_account_withdraw_insufficient() {
        let mut account = Account::new("A", "Alice", Balance::new(dec!(10.0)));
        let result = account.withdraw(Amount::new(dec!(10.01)).unwrap());
        assert!(matches!(result, Err(BankError::InsufficientBalance)));
        assert_eq!(account.balance, Balance::new(dec!(10.0)));
    }
}
