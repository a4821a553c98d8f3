//! Per-participant commit progress.

use crate::dtx_id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far a participant has progressed for a transaction, as known to the
/// node holding the record.
///
/// The four values form a single chain: `Unknown < Sent < Executed <
/// Persistent`. All state updates go through [`merge`](Self::merge), which
/// takes the maximum of the current and proposed values, so a participant's
/// recorded state never moves backwards no matter how messages are
/// duplicated or reordered. `Persistent` is terminal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ParticipantState {
    /// Nothing known yet
    #[default]
    Unknown,
    /// Operation dispatched to the participant
    Sent,
    /// Participant executed the operation in volatile memory
    Executed,
    /// Participant made the operation durable
    Persistent,
}

impl ParticipantState {
    /// Lattice join: the later of the two states along the chain.
    ///
    /// Commutative, associative, idempotent. Total; never fails.
    pub fn merge(self, proposed: ParticipantState) -> ParticipantState {
        self.max(proposed)
    }

    /// Whether the participant has made the transaction durable.
    pub fn is_durable(&self) -> bool {
        matches!(self, ParticipantState::Persistent)
    }
}

impl fmt::Display for ParticipantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParticipantState::Unknown => "unknown",
            ParticipantState::Sent => "sent",
            ParticipantState::Executed => "executed",
            ParticipantState::Persistent => "persistent",
        };
        write!(f, "{}", name)
    }
}

/// One participant's progress within a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantEntry {
    pub node: NodeId,
    pub state: ParticipantState,
}

impl ParticipantEntry {
    pub fn new(node: NodeId, state: ParticipantState) -> Self {
        Self { node, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ParticipantState::*;

    const CHAIN: [ParticipantState; 4] = [Unknown, Sent, Executed, Persistent];

    #[test]
    fn test_chain_order() {
        for pair in CHAIN.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(Persistent.is_durable());
        assert!(!Executed.is_durable());
    }

    #[test]
    fn test_merge_never_regresses() {
        for a in CHAIN {
            for b in CHAIN {
                let merged = a.merge(b);
                assert!(merged >= a);
                assert!(merged >= b);
            }
        }
    }

    #[test]
    fn test_merge_commutative_idempotent() {
        for a in CHAIN {
            assert_eq!(a.merge(a), a);
            for b in CHAIN {
                assert_eq!(a.merge(b), b.merge(a));
            }
        }
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(ParticipantState::default(), Unknown);
    }
}
