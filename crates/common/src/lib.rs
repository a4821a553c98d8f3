//! Shared data model for the distributed transaction log
//!
//! This crate holds the types exchanged between the messaging layer and the
//! participant-local log: node and transaction identifiers, the per-participant
//! state lattice, and the transaction record that is both the wire carrier for
//! protocol messages and the durable form the log persists.

pub mod dtx_id;
pub mod record;
pub mod state;

pub use dtx_id::{DtxId, NodeId};
pub use record::DtxRecord;
pub use state::{ParticipantEntry, ParticipantState};
