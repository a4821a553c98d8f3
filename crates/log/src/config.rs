//! Log configuration

use dtx_common::NodeId;
use std::path::PathBuf;

/// Default bound on distinct participants per transaction record.
pub const DEFAULT_MAX_PARTICIPANTS: usize = 3;

/// Default bound on payload size used for capacity accounting.
pub const DEFAULT_PAYLOAD_LIMIT: usize = 64 * 1024;

/// Configuration for a participant-local transaction log
#[derive(Clone)]
pub struct LogConfig {
    /// Directory for the durable collection
    pub data_dir: PathBuf,

    /// Identity of the local participant. Execution events recorded through
    /// this log act on this participant's entry.
    pub node: NodeId,

    /// Maximum number of distinct participants tracked per record
    pub max_participants: usize,

    /// Maximum accepted payload size in bytes. Capacity reservation is
    /// sized against this bound, so larger payloads are rejected.
    pub payload_limit: usize,

    /// Block cache size for Fjall (in bytes)
    pub block_cache_size: u64,

    /// Compression type for record data
    pub compression: fjall::CompressionType,

    /// Persist mode applied when a transaction commits
    pub persist_mode: fjall::PersistMode,
}

impl Default for LogConfig {
    fn default() -> Self {
        // Use tempfile to create a proper temporary directory
        // Using .keep() to persist the directory (won't be auto-deleted)
        let temp_dir = tempfile::tempdir()
            .expect("Failed to create temporary directory")
            .keep();

        Self {
            data_dir: temp_dir,
            node: NodeId::new(0),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            payload_limit: DEFAULT_PAYLOAD_LIMIT,
            block_cache_size: 16 * 1024 * 1024, // 16 MB
            compression: fjall::CompressionType::Lz4,
            persist_mode: fjall::PersistMode::SyncAll,
        }
    }
}

impl LogConfig {
    /// Create a new config with the given data directory and local node
    pub fn new(data_dir: PathBuf, node: NodeId) -> Self {
        Self {
            data_dir,
            node,
            ..Default::default()
        }
    }

    /// Set the participant bound per record
    pub fn with_max_participants(mut self, max: usize) -> Self {
        self.max_participants = max;
        self
    }

    /// Set the payload accounting bound
    pub fn with_payload_limit(mut self, limit: usize) -> Self {
        self.payload_limit = limit;
        self
    }

    /// Set block cache size
    pub fn with_block_cache_size(mut self, size: u64) -> Self {
        self.block_cache_size = size;
        self
    }

    /// Set compression type
    pub fn with_compression(mut self, compression: fjall::CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Set persist mode
    pub fn with_persist_mode(mut self, mode: fjall::PersistMode) -> Self {
        self.persist_mode = mode;
        self
    }
}
