//! Error types for the transaction log

use dtx_common::DtxId;
use thiserror::Error;

/// Result type for log operations
pub type Result<T> = std::result::Result<T, LogError>;

/// Log error types
///
/// Absence of a record is never an error: `find` returns `Option` and
/// `prune` reports a no-op through its return value. Exhausting a
/// transaction's reserved capacity is not an error either: it is a broken
/// caller invariant and panics at the point of detection.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("storage error: {0}")]
    Storage(#[from] fjall::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("log root not found in keyspace; create the log before attaching")]
    Uninitialized,

    #[error("record {id} already tracks the maximum of {limit} participants")]
    ParticipantLimit { id: DtxId, limit: usize },

    #[error("payload of {len} bytes exceeds the configured limit of {limit}")]
    PayloadLimit { len: usize, limit: usize },
}
