//! Adapters for the domain ports: the in-process lock registry and the
//! storage backends.

pub mod in_memory;
pub mod lock_registry;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
mod staging;
