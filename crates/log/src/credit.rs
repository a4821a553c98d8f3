//! Capacity reservation for log transactions.
//!
//! The storage engine cannot grow a transaction's resource budget once the
//! transaction is open, so every caller follows a two-phase discipline:
//! first compute the worst-case budget for the operations it intends to
//! perform with [`log_credit`], then open the transaction with that budget
//! reserved. [`log_credit`] is a pure function of its arguments; it never
//! touches the log and may be called concurrently without the log lock.

use crate::config::LogConfig;
use std::ops::{Add, AddAssign};

/// Durable key bytes per record.
const RECORD_KEY_BYTES: u64 = 16;

/// Encoding overhead of a record outside its participant list and payload.
const RECORD_BASE_BYTES: u64 = 128;

/// Worst-case encoded size of one participant entry.
const PARTICIPANT_BYTES: u64 = 48;

/// Size of the log's durable root marker.
const ROOT_MARKER_BYTES: u64 = 32;

/// The kinds of mutation a log transaction can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogOpKind {
    /// Allocate the durable root structure of a new log
    CreateLog,
    /// Insert a record for a previously unseen transaction
    InsertRecord,
    /// Rewrite an existing record after a merge
    UpdateRecord,
    /// Remove a single record (retention)
    RemoveRecord,
    /// Tear the log down; `nr` is the current record count
    DestroyLog,
}

/// Reserved capacity for one log transaction.
///
/// Plain accounting value: a number of staged writes and a byte budget.
/// Budgets for independent operations are combined with `+`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxCredit {
    pub writes: u64,
    pub bytes: u64,
}

impl TxCredit {
    pub const ZERO: TxCredit = TxCredit { writes: 0, bytes: 0 };

    pub const fn new(writes: u64, bytes: u64) -> Self {
        Self { writes, bytes }
    }
}

impl Add for TxCredit {
    type Output = TxCredit;

    fn add(self, rhs: TxCredit) -> TxCredit {
        TxCredit {
            writes: self.writes.saturating_add(rhs.writes),
            bytes: self.bytes.saturating_add(rhs.bytes),
        }
    }
}

impl AddAssign for TxCredit {
    fn add_assign(&mut self, rhs: TxCredit) {
        *self = *self + rhs;
    }
}

/// Worst-case encoded size of one record under `config`'s bounds,
/// including its durable key.
fn record_upper_bound(config: &LogConfig) -> u64 {
    RECORD_KEY_BYTES
        + RECORD_BASE_BYTES
        + config.max_participants as u64 * PARTICIPANT_BYTES
        + config.payload_limit as u64
}

/// Compute the capacity that must be reserved before opening a transaction
/// that performs `op` `nr` times against a log configured with `config`.
pub fn log_credit(config: &LogConfig, op: LogOpKind, nr: u64) -> TxCredit {
    match op {
        LogOpKind::CreateLog => TxCredit::new(nr, nr.saturating_mul(ROOT_MARKER_BYTES)),
        LogOpKind::InsertRecord | LogOpKind::UpdateRecord => {
            TxCredit::new(nr, nr.saturating_mul(record_upper_bound(config)))
        }
        LogOpKind::RemoveRecord => TxCredit::new(nr, nr.saturating_mul(RECORD_KEY_BYTES)),
        LogOpKind::DestroyLog => {
            // One tombstone per record plus the root marker
            TxCredit::new(
                nr.saturating_add(1),
                nr.saturating_mul(RECORD_KEY_BYTES)
                    .saturating_add(ROOT_MARKER_BYTES),
            )
        }
    }
}
