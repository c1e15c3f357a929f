//! SQLite backend for the identity reconciliation store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each [`ContactStore::transact`] call
//! is one `BEGIN IMMEDIATE` transaction on that thread.
//!
//! [`ContactStore::transact`]: ident_core::store::ContactStore::transact

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
