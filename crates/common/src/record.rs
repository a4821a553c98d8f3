//! The transaction record.
//!
//! A record is everything a node durably knows about one distributed
//! transaction: the identifier, one entry per participant the protocol has
//! learned about, and the operation payload once the local execution event
//! has supplied it. The same shape travels in protocol messages (the
//! messaging layer fills one in and hands it to the log) and sits in the
//! durable collection.

use crate::dtx_id::{DtxId, NodeId};
use crate::state::{ParticipantEntry, ParticipantState};
use serde::{Deserialize, Serialize};

/// Per-transaction log record.
///
/// `payload` is `None` until the local participant's own execution supplies
/// it; a record created purely from a remote persistent notice carries no
/// payload. Once set it is never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtxRecord {
    pub id: DtxId,
    pub participants: Vec<ParticipantEntry>,
    pub payload: Option<Vec<u8>>,
}

impl DtxRecord {
    /// Empty record for a transaction: no participants, no payload.
    pub fn new(id: DtxId) -> Self {
        Self {
            id,
            participants: Vec::new(),
            payload: None,
        }
    }

    /// Builder-style participant entry, merging if the node is already
    /// listed. Used by the messaging layer to assemble incoming records.
    pub fn with_participant(mut self, node: NodeId, state: ParticipantState) -> Self {
        match self.participants.iter_mut().find(|e| e.node == node) {
            Some(entry) => entry.state = entry.state.merge(state),
            None => self.participants.push(ParticipantEntry::new(node, state)),
        }
        self
    }

    /// Builder-style payload attach.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Recorded state of `node`, or `None` if the record has never learned
    /// about that participant.
    pub fn participant_state(&self, node: NodeId) -> Option<ParticipantState> {
        self.participants
            .iter()
            .find(|e| e.node == node)
            .map(|e| e.state)
    }

    /// Whether the payload has been supplied.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Whether every known participant has made the transaction durable.
    ///
    /// False for a record with no participants at all.
    pub fn is_fully_persistent(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|e| e.state.is_durable())
    }

    /// Serialize to bytes for persistence
    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|e| format!("failed to serialize transaction record: {}", e))?;
        Ok(bytes)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        ciborium::de::from_reader(bytes)
            .map_err(|e| format!("failed to deserialize transaction record: {}", e))
    }
}
