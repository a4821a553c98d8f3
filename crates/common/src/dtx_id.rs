//! Distributed transaction identifiers.
//!
//! A transaction is identified by the node that originated it plus that
//! node's logical clock value at issue time. The pair is globally unique and
//! totally ordered, which is all the log needs for deterministic enumeration
//! during recovery scans.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node identifier.
///
/// In a real deployment this would be derived from a cluster membership
/// service; a `u64` is enough for the log, which only needs equality and a
/// total order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(id: u64) -> Self {
        NodeId(id)
    }

    pub fn from_hex(hex: &str) -> Result<Self, String> {
        u64::from_str_radix(hex, 16)
            .map(NodeId)
            .map_err(|e| e.to_string())
    }

    /// Big-endian byte form, used in durable keys.
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        NodeId(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Distributed transaction identifier.
///
/// Total ordering: originator node first, then the originator's logical
/// clock value. The comparison is total and never fails; wherever records
/// must be enumerated deterministically (recovery scans in particular) this
/// is the canonical order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DtxId {
    /// Node that issued the transaction
    pub originator: NodeId,
    /// Originator-local logical clock value
    pub clock: u64,
}

impl DtxId {
    pub const fn new(originator: NodeId, clock: u64) -> Self {
        Self { originator, clock }
    }

    /// Encode as a 16-byte key whose lexicographic order equals `Ord` order.
    ///
    /// The log store uses this for its durable partition keys so that an
    /// unfiltered partition scan visits records in ascending identifier
    /// order.
    pub fn to_key_bytes(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&self.originator.to_be_bytes());
        key[8..].copy_from_slice(&self.clock.to_be_bytes());
        key
    }

    /// Decode a key produced by [`to_key_bytes`](Self::to_key_bytes).
    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != 16 {
            return Err(format!("expected 16 key bytes, got {}", bytes.len()));
        }
        let mut node = [0u8; 8];
        let mut clock = [0u8; 8];
        node.copy_from_slice(&bytes[..8]);
        clock.copy_from_slice(&bytes[8..]);
        Ok(Self {
            originator: NodeId::from_be_bytes(node),
            clock: u64::from_be_bytes(clock),
        })
    }

    /// Parse from string format: "originator_hex:clock"
    pub fn parse(s: &str) -> Result<Self, String> {
        let (node, clock) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid transaction id: {} (expected nodeid:clock)", s))?;
        let originator = NodeId::from_hex(node).map_err(|_| format!("invalid node id: {}", node))?;
        let clock = clock
            .parse()
            .map_err(|_| format!("invalid clock component: {}", clock))?;
        Ok(Self { originator, clock })
    }
}

impl fmt::Display for DtxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.originator, self.clock)
    }
}
