//! Application layer containing the transaction orchestration.
//!
//! `BankService` is the entry point callers use to open accounts and submit
//! deposits and withdrawals. It owns no balances: every read and write goes
//! through a storage scope, and an account lock is held for the duration of
//! each mutation.

pub mod lock_guard;
pub mod service;
