//! Persistence error type shared by every ledger implementation.
//!
//! The ledger is the durable record store behind the marketplace. Implementations
//! (in-memory for tests and development, `PostgreSQL` for production) all report
//! failures through [`StoreError`] so that callers can tell a lost optimistic-concurrency
//! race apart from an infrastructure failure.

use crate::version::Version;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by dyn-compatible store traits.
///
/// Store traits return `BoxFuture` instead of using `async fn` so they can be used as
/// trait objects (`Arc<dyn LedgerStore>`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur during ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the record moved on since it was read.
    ///
    /// Another writer updated the record between our read and our write. The caller
    /// must reload and re-evaluate instead of overwriting.
    #[error("Concurrency conflict on {record}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Record identifier (e.g. `booking:<uuid>`).
        record: String,
        /// The version the writer read.
        expected: Version,
        /// The version currently stored.
        actual: Version,
    },

    /// The record to update does not exist.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// A record with the same identity already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StoreError {
    /// True when this error is a lost optimistic-concurrency race.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
