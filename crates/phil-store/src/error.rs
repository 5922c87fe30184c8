//! Error types for the Phil load-record store.

use thiserror::Error;

/// Result type alias for load-store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised by the redb-backed load store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Not connected")]
    NotConnected,

    #[error("failed to open load store: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("failed to encode load record: {0}")]
    Serialize(String),

    #[error("failed to decode load record: {0}")]
    Deserialize(String),
}
