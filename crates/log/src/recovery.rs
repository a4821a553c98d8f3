//! Redo derivation for a recovering participant.
//!
//! When the messaging layer detects that a participant is rejoining, it asks
//! the log which transactions that participant has not yet made durable.
//! The scan is read-only: replaying the answer mutates the log only when the
//! responses come back in as `Redo`/`Persistent` events.

use crate::store::DtxLog;
use dtx_common::{DtxId, DtxRecord, NodeId};
use serde::{Deserialize, Serialize};

/// One transaction a recovering participant must replay.
///
/// A record created purely from third-party persistent notices never
/// received the operation payload, so the redo cannot be built from local
/// data alone; such records are surfaced as [`MissingPayload`] so the
/// messaging layer can fetch the payload from another participant instead
/// of silently skipping the transaction.
///
/// [`MissingPayload`]: RedoCandidate::MissingPayload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedoCandidate {
    /// The record carries the payload; redo content is ready to transmit.
    Ready(DtxRecord),
    /// The payload must be sought from another participant.
    MissingPayload(DtxRecord),
}

impl RedoCandidate {
    pub fn record(&self) -> &DtxRecord {
        match self {
            RedoCandidate::Ready(record) | RedoCandidate::MissingPayload(record) => record,
        }
    }

    pub fn id(&self) -> DtxId {
        self.record().id
    }

    /// Redo content, when locally available.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            RedoCandidate::Ready(record) => record.payload.as_deref(),
            RedoCandidate::MissingPayload(_) => None,
        }
    }
}

impl DtxLog {
    /// Compute, in ascending transaction-identifier order, every record
    /// where `recovering`'s entry has not reached `Persistent`.
    ///
    /// Records that never learned about `recovering` are skipped; the
    /// participant took no part in those transactions. No state is mutated.
    pub fn redo_candidates(&self, recovering: NodeId) -> Vec<RedoCandidate> {
        let candidates: Vec<RedoCandidate> = self.with_index(|index| {
            index
                .values()
                .filter(|record| {
                    record
                        .participant_state(recovering)
                        .is_some_and(|state| !state.is_durable())
                })
                .map(|record| {
                    if record.has_payload() {
                        RedoCandidate::Ready(record.clone())
                    } else {
                        RedoCandidate::MissingPayload(record.clone())
                    }
                })
                .collect()
        });

        tracing::debug!(
            "derived {} redo candidates for participant {}",
            candidates.len(),
            recovering
        );
        candidates
    }
}
