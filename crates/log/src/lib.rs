//! Participant-local log for a distributed, zero-phase transaction protocol
//!
//! Each node in the cluster durably remembers, per distributed transaction,
//! how far every participant has progressed, so that a crashed participant
//! can be brought back up to date by replaying exactly the operations it
//! missed. This crate provides:
//! - A durable collection of transaction records (built on Fjall) with a
//!   volatile index rebuilt on attach
//! - A capacity-reservation protocol: budgets are computed up front because
//!   an open atomic transaction cannot grow mid-flight
//! - The lattice-merge update engine: participant states only ever move
//!   forward along `Unknown < Sent < Executed < Persistent`, making every
//!   update commutative and idempotent under message reordering and
//!   duplication
//! - Redo derivation for a recovering participant
//!
//! # Usage
//!
//! ```no_run
//! use dtx_common::{DtxId, DtxRecord, NodeId, ParticipantState};
//! use dtx_log::{log_credit, DtxLog, LogConfig, LogEvent, LogOpKind};
//!
//! let local = NodeId::new(2);
//! let config = LogConfig::new("/var/lib/dtx".into(), local);
//! let log = DtxLog::open(config.clone())?;
//!
//! // Phase 1 (unlocked): reserve capacity, open the transaction.
//! let credit = log_credit(&config, LogOpKind::InsertRecord, 1);
//! let mut tx = log.begin_tx(credit);
//!
//! // Phase 2 (locked, atomic): merge the event and commit.
//! let incoming = DtxRecord::new(DtxId::new(NodeId::new(1), 42))
//!     .with_participant(local, ParticipantState::Unknown)
//!     .with_payload(b"put k v".to_vec());
//! log.apply_event(&mut tx, LogEvent::Executed, &incoming)?;
//! tx.commit()?;
//! # Ok::<(), dtx_log::LogError>(())
//! ```

pub mod config;
pub mod credit;
pub mod error;
pub mod recovery;
pub mod store;
pub mod tx;

pub use config::{LogConfig, DEFAULT_MAX_PARTICIPANTS, DEFAULT_PAYLOAD_LIMIT};
pub use credit::{log_credit, LogOpKind, TxCredit};
pub use error::{LogError, Result};
pub use recovery::RedoCandidate;
pub use store::{DtxLog, LogEvent};
pub use tx::LogTx;

// Re-export fjall for callers that manage the keyspace themselves
pub use fjall;
