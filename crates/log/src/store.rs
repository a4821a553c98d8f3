//! The participant-local log store.
//!
//! The aggregate pairs a durable collection of transaction records (a Fjall
//! partition, mutated only through an open [`LogTx`]) with a volatile index
//! rebuilt from it on attach. Record keys are the identifier's big-endian
//! byte form, so partition order equals identifier order. A single mutex
//! serializes every access to the aggregate; only capacity computation
//! ([`log_credit`](crate::log_credit)) runs outside it.

use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::tx::LogTx;
use dtx_common::{DtxId, DtxRecord, NodeId, ParticipantEntry, ParticipantState};
use fjall::{Keyspace, Partition, PartitionCreateOptions, PersistMode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const RECORDS_PARTITION: &str = "dtx_records";
const META_PARTITION: &str = "dtx_meta";
const LOG_ROOT_KEY: &[u8] = b"log_root";

/// A protocol event driving a log update.
///
/// `Sent`, `Executed` and `Redo` act on the local participant's entry;
/// `Persistent` raises whichever participants the incoming record marks
/// persistent. Only `Executed` and `Redo` may supply the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEvent {
    /// The local originator dispatched the operation
    Sent,
    /// The local participant executed the operation
    Executed,
    /// A participant reported the operation durable
    Persistent,
    /// A recovery instruction to re-execute the operation locally
    Redo,
}

/// Participant-local transaction log.
pub struct DtxLog {
    keyspace: Keyspace,
    persist_mode: PersistMode,
    shared: Mutex<LogShared>,
}

/// Everything behind the exclusion lock: the durable partitions and the
/// volatile index derived from them.
struct LogShared {
    records: Partition,
    meta: Partition,
    index: BTreeMap<DtxId, DtxRecord>,
    node: NodeId,
    max_participants: usize,
    payload_limit: usize,
}

impl DtxLog {
    /// Allocate the durable root structure of a new log inside the caller's
    /// open transaction.
    ///
    /// Credit: [`LogOpKind::CreateLog`](crate::LogOpKind::CreateLog). The
    /// log is usable once the transaction commits; until then the root
    /// marker is only staged.
    pub fn create(keyspace: &Keyspace, config: &LogConfig, tx: &mut LogTx) -> Result<Self> {
        let (records, meta) = Self::open_partitions(keyspace, config)?;
        tx.stage_insert(&meta, LOG_ROOT_KEY.to_vec(), Vec::new());

        tracing::info!("created transaction log for node {}", config.node);

        Ok(Self {
            keyspace: keyspace.clone(),
            persist_mode: config.persist_mode,
            shared: Mutex::new(LogShared {
                records,
                meta,
                index: BTreeMap::new(),
                node: config.node,
                max_participants: config.max_participants,
                payload_limit: config.payload_limit,
            }),
        })
    }

    /// Open an existing log, rebuilding the volatile index from the durable
    /// collection. Durable content is not altered.
    ///
    /// Fails with [`LogError::Uninitialized`] if the keyspace has no log
    /// root (i.e. [`create`](Self::create) never committed here).
    pub fn attach(keyspace: &Keyspace, config: &LogConfig) -> Result<Self> {
        let (records, meta) = Self::open_partitions(keyspace, config)?;

        if meta.get(LOG_ROOT_KEY)?.is_none() {
            return Err(LogError::Uninitialized);
        }

        let mut index = BTreeMap::new();
        for result in records.iter() {
            let (key, value) = result?;
            let id = DtxId::from_key_bytes(&key).map_err(LogError::Encoding)?;
            let record = DtxRecord::from_bytes(&value).map_err(LogError::Encoding)?;
            if record.id != id {
                return Err(LogError::Encoding(format!(
                    "record under key {} claims identifier {}",
                    id, record.id
                )));
            }
            index.insert(id, record);
        }

        tracing::debug!("attached transaction log with {} records", index.len());

        Ok(Self {
            keyspace: keyspace.clone(),
            persist_mode: config.persist_mode,
            shared: Mutex::new(LogShared {
                records,
                meta,
                index,
                node: config.node,
                max_participants: config.max_participants,
                payload_limit: config.payload_limit,
            }),
        })
    }

    /// Open the log at `config.data_dir`, creating it on first use.
    pub fn open(config: LogConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let keyspace = fjall::Config::new(&config.data_dir)
            .cache_size(config.block_cache_size)
            .open()?;

        let initialized = {
            let (_, meta) = Self::open_partitions(&keyspace, &config)?;
            meta.get(LOG_ROOT_KEY)?.is_some()
        };

        if initialized {
            Self::attach(&keyspace, &config)
        } else {
            let credit = crate::log_credit(&config, crate::LogOpKind::CreateLog, 1);
            let mut tx = LogTx::begin(&keyspace, config.persist_mode, credit);
            let log = Self::create(&keyspace, &config, &mut tx)?;
            tx.commit()?;
            Ok(log)
        }
    }

    /// Release volatile resources. The durable collection is untouched and
    /// can be re-opened with [`attach`](Self::attach).
    pub fn detach(self) {}

    /// Reclaim the durable root structure: stage removal of every record
    /// and the root marker into the caller's open transaction, consuming
    /// the handle.
    ///
    /// Credit: [`LogOpKind::DestroyLog`](crate::LogOpKind::DestroyLog) with
    /// `nr` = current record count.
    pub fn destroy(self, tx: &mut LogTx) -> Result<()> {
        let mut shared = self.shared.lock();

        let ids: Vec<DtxId> = shared.index.keys().copied().collect();
        for id in &ids {
            tx.stage_remove(&shared.records, id.to_key_bytes().to_vec());
        }
        tx.stage_remove(&shared.meta, LOG_ROOT_KEY.to_vec());
        shared.index.clear();

        tracing::info!("destroyed transaction log ({} records reclaimed)", ids.len());
        Ok(())
    }

    /// Open a transaction against this log's keyspace with `credit`
    /// reserved.
    pub fn begin_tx(&self, credit: crate::TxCredit) -> LogTx {
        LogTx::begin(&self.keyspace, self.persist_mode, credit)
    }

    /// Look up the record for `id`. Absence is a normal outcome.
    ///
    /// The returned record is a copy taken under the lock; it does not
    /// observe later merges.
    pub fn find(&self, id: DtxId) -> Option<DtxRecord> {
        self.shared.lock().index.get(&id).cloned()
    }

    /// Number of records in the log.
    pub fn len(&self) -> usize {
        self.shared.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().index.is_empty()
    }

    /// Merge a protocol event into the record for `incoming.id`, creating
    /// the record if this is the first event for that transaction.
    ///
    /// Every participant state moves by lattice join only: an event
    /// proposing a lower-or-equal state is accepted as a no-op, so
    /// duplicated and reordered deliveries are harmless. Credit:
    /// [`InsertRecord`](crate::LogOpKind::InsertRecord) if the record may
    /// be new, [`UpdateRecord`](crate::LogOpKind::UpdateRecord) otherwise.
    pub fn apply_event(&self, tx: &mut LogTx, event: LogEvent, incoming: &DtxRecord) -> Result<()> {
        let mut shared = self.shared.lock();
        let id = incoming.id;

        // A redo for an already-durable local operation must change nothing.
        if event == LogEvent::Redo {
            if let Some(existing) = shared.index.get(&id) {
                if existing.participant_state(shared.node) == Some(ParticipantState::Persistent) {
                    return Ok(());
                }
            }
        }

        let mut record = match shared.index.get(&id) {
            Some(existing) => existing.clone(),
            None => {
                // First event for this transaction: start every named
                // participant at Unknown and let the merge below raise them.
                let mut fresh = DtxRecord::new(id);
                for entry in &incoming.participants {
                    merge_entry(
                        &mut fresh,
                        entry.node,
                        ParticipantState::Unknown,
                        shared.max_participants,
                    )?;
                }
                fresh
            }
        };

        for entry in &incoming.participants {
            merge_entry(&mut record, entry.node, entry.state, shared.max_participants)?;
        }

        let proposed = match event {
            LogEvent::Sent => Some(ParticipantState::Sent),
            LogEvent::Executed | LogEvent::Redo => Some(ParticipantState::Executed),
            LogEvent::Persistent => None,
        };
        if let Some(state) = proposed {
            let node = shared.node;
            merge_entry(&mut record, node, state, shared.max_participants)?;
        }

        // Only the local execution supplies the payload, and a payload that
        // has been recorded is never replaced or cleared.
        if matches!(event, LogEvent::Executed | LogEvent::Redo) && !record.has_payload() {
            if let Some(payload) = &incoming.payload {
                if payload.len() > shared.payload_limit {
                    return Err(LogError::PayloadLimit {
                        len: payload.len(),
                        limit: shared.payload_limit,
                    });
                }
                record.payload = Some(payload.clone());
            }
        }

        let value = record.to_bytes().map_err(LogError::Encoding)?;
        tx.stage_insert(&shared.records, id.to_key_bytes().to_vec(), value);
        shared.index.insert(id, record);

        Ok(())
    }

    /// Remove the record for `id` if every participant has reached
    /// `Persistent`. Returns `false` (a no-op) for absent or still
    /// incomplete records.
    ///
    /// Credit: [`RemoveRecord`](crate::LogOpKind::RemoveRecord).
    pub fn prune(&self, tx: &mut LogTx, id: DtxId) -> Result<bool> {
        let mut shared = self.shared.lock();

        let reclaimable = shared
            .index
            .get(&id)
            .map(|record| record.is_fully_persistent())
            .unwrap_or(false);
        if !reclaimable {
            return Ok(false);
        }

        tx.stage_remove(&shared.records, id.to_key_bytes().to_vec());
        shared.index.remove(&id);

        tracing::debug!("pruned fully persistent record {}", id);
        Ok(true)
    }

    fn open_partitions(keyspace: &Keyspace, config: &LogConfig) -> Result<(Partition, Partition)> {
        let records = keyspace.open_partition(
            RECORDS_PARTITION,
            PartitionCreateOptions::default()
                .block_size(32 * 1024)
                .compression(config.compression),
        )?;

        let meta = keyspace.open_partition(
            META_PARTITION,
            PartitionCreateOptions::default()
                .block_size(16 * 1024)
                .compression(fjall::CompressionType::None),
        )?;

        Ok((records, meta))
    }

    pub(crate) fn with_index<R>(&self, f: impl FnOnce(&BTreeMap<DtxId, DtxRecord>) -> R) -> R {
        f(&self.shared.lock().index)
    }
}

impl Drop for DtxLog {
    fn drop(&mut self) {
        // Ensure data is persisted on drop
        let _ = self.keyspace.persist(PersistMode::SyncAll);
    }
}

/// Join `state` into `record`'s entry for `node`, appending a new entry
/// when the participant is unseen and the bound allows it.
fn merge_entry(
    record: &mut DtxRecord,
    node: NodeId,
    state: ParticipantState,
    limit: usize,
) -> Result<()> {
    if let Some(entry) = record.participants.iter_mut().find(|e| e.node == node) {
        entry.state = entry.state.merge(state);
        return Ok(());
    }

    if record.participants.len() >= limit {
        return Err(LogError::ParticipantLimit {
            id: record.id,
            limit,
        });
    }

    record.participants.push(ParticipantEntry::new(node, state));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{log_credit, LogOpKind};

    fn open_log(dir: &std::path::Path) -> (LogConfig, DtxLog) {
        let config = LogConfig::new(dir.to_path_buf(), NodeId::new(1));
        let log = DtxLog::open(config.clone()).unwrap();
        (config, log)
    }

    #[test]
    fn test_open_creates_then_attaches() {
        let dir = tempfile::tempdir().unwrap();

        let (_, log) = open_log(dir.path());
        assert!(log.is_empty());
        drop(log);

        // Second open must take the attach path and still see a valid root
        let (_, log) = open_log(dir.path());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn test_apply_creates_and_finds() {
        let dir = tempfile::tempdir().unwrap();
        let (config, log) = open_log(dir.path());

        let id = DtxId::new(NodeId::new(9), 1);
        let incoming = DtxRecord::new(id)
            .with_participant(NodeId::new(1), ParticipantState::Unknown)
            .with_payload(b"op".to_vec());

        let mut tx = log.begin_tx(log_credit(&config, LogOpKind::InsertRecord, 1));
        log.apply_event(&mut tx, LogEvent::Executed, &incoming).unwrap();
        tx.commit().unwrap();

        let record = log.find(id).unwrap();
        assert_eq!(
            record.participant_state(NodeId::new(1)),
            Some(ParticipantState::Executed)
        );
        assert_eq!(record.payload.as_deref(), Some(b"op".as_ref()));

        assert!(log.find(DtxId::new(NodeId::new(9), 2)).is_none());
    }

    #[test]
    fn test_participant_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (config, log) = open_log(dir.path());

        let id = DtxId::new(NodeId::new(9), 1);
        let mut incoming = DtxRecord::new(id);
        for n in 0..4 {
            incoming = incoming.with_participant(NodeId::new(10 + n), ParticipantState::Unknown);
        }

        let mut tx = log.begin_tx(log_credit(&config, LogOpKind::InsertRecord, 1));
        let err = log
            .apply_event(&mut tx, LogEvent::Persistent, &incoming)
            .unwrap_err();
        assert!(matches!(err, LogError::ParticipantLimit { limit: 3, .. }));

        // Nothing was staged or indexed
        assert!(log.find(id).is_none());
    }

    #[test]
    fn test_payload_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::new(dir.path().to_path_buf(), NodeId::new(1)).with_payload_limit(8);
        let log = DtxLog::open(config.clone()).unwrap();

        let id = DtxId::new(NodeId::new(9), 1);
        let incoming = DtxRecord::new(id).with_payload(vec![0u8; 9]);

        let mut tx = log.begin_tx(log_credit(&config, LogOpKind::InsertRecord, 1));
        let err = log
            .apply_event(&mut tx, LogEvent::Executed, &incoming)
            .unwrap_err();
        assert!(matches!(err, LogError::PayloadLimit { len: 9, limit: 8 }));
    }
}
