//! Persistence backends for fingerprints, the URL ledger and property records.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStorage, MemoryStorageError};
pub use postgres::PostgresStorage;
