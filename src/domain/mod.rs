//! Domain types and the ports the service talks to.

pub mod account;
pub mod ports;
pub mod scope;
pub mod transaction;
