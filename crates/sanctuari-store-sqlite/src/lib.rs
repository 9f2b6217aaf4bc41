//! SQLite backend for the Sanctuari procurement store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Conditional writes (number
//! assignment, token consumption, winner selection) each run in a single
//! SQLite transaction.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
