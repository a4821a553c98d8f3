//! Atomic transaction wrapper.
//!
//! [`LogTx`] is the log's view of the storage engine's atomic write
//! transaction: a Fjall batch plus the capacity the caller reserved for it.
//! Writes staged between [`begin`](LogTx::begin) and
//! [`commit`](LogTx::commit) are applied all-or-nothing; dropping the
//! transaction without committing discards them.

use crate::credit::TxCredit;
use crate::error::Result;
use fjall::{Batch, Keyspace, Partition, PersistMode};

/// An open atomic transaction with a reserved capacity budget.
pub struct LogTx {
    batch: Batch,
    keyspace: Keyspace,
    persist_mode: PersistMode,
    remaining: TxCredit,
}

impl LogTx {
    /// Open a transaction against `keyspace` with `credit` reserved.
    ///
    /// The credit must have been computed with
    /// [`log_credit`](crate::log_credit) for every operation the caller
    /// intends to perform inside this transaction.
    pub fn begin(keyspace: &Keyspace, persist_mode: PersistMode, credit: TxCredit) -> Self {
        Self {
            batch: keyspace.batch(),
            keyspace: keyspace.clone(),
            persist_mode,
            remaining: credit,
        }
    }

    /// Capacity still available in this transaction.
    pub fn remaining(&self) -> TxCredit {
        self.remaining
    }

    /// Commit every staged write atomically and persist the keyspace.
    pub fn commit(self) -> Result<()> {
        self.batch.commit()?;
        self.keyspace.persist(self.persist_mode)?;
        Ok(())
    }

    pub(crate) fn stage_insert(&mut self, partition: &Partition, key: Vec<u8>, value: Vec<u8>) {
        self.debit(key.len() as u64 + value.len() as u64);
        self.batch.insert(partition, key, value);
    }

    pub(crate) fn stage_remove(&mut self, partition: &Partition, key: Vec<u8>) {
        self.debit(key.len() as u64);
        self.batch.remove(partition, key);
    }

    /// Consume budget for one staged write.
    ///
    /// An open transaction's budget cannot grow, so running out here means
    /// the caller skipped the reservation phase; the transaction cannot be
    /// continued or retried safely.
    fn debit(&mut self, bytes: u64) {
        assert!(
            self.remaining.writes >= 1 && self.remaining.bytes >= bytes,
            "log transaction credit exhausted (remaining {:?}, staging {} bytes); \
             reserve capacity with log_credit before opening the transaction",
            self.remaining,
            bytes,
        );
        self.remaining.writes -= 1;
        self.remaining.bytes -= bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjall::PartitionCreateOptions;

    fn keyspace_with_partition() -> (tempfile::TempDir, Keyspace, Partition) {
        let dir = tempfile::tempdir().unwrap();
        let keyspace = fjall::Config::new(dir.path()).open().unwrap();
        let partition = keyspace
            .open_partition("test", PartitionCreateOptions::default())
            .unwrap();
        (dir, keyspace, partition)
    }

    #[test]
    fn test_commit_applies_staged_writes() {
        let (_dir, keyspace, partition) = keyspace_with_partition();

        let mut tx = LogTx::begin(&keyspace, PersistMode::Buffer, TxCredit::new(2, 64));
        tx.stage_insert(&partition, b"k1".to_vec(), b"v1".to_vec());
        tx.stage_insert(&partition, b"k2".to_vec(), b"v2".to_vec());
        tx.commit().unwrap();

        assert_eq!(&*partition.get(b"k1").unwrap().unwrap(), b"v1");
        assert_eq!(&*partition.get(b"k2").unwrap().unwrap(), b"v2");
    }

    #[test]
    fn test_drop_discards_staged_writes() {
        let (_dir, keyspace, partition) = keyspace_with_partition();

        {
            let mut tx = LogTx::begin(&keyspace, PersistMode::Buffer, TxCredit::new(1, 64));
            tx.stage_insert(&partition, b"k".to_vec(), b"v".to_vec());
            // dropped without commit
        }

        assert!(partition.get(b"k").unwrap().is_none());
    }

    #[test]
    fn test_debit_tracks_remaining() {
        let (_dir, keyspace, partition) = keyspace_with_partition();

        let mut tx = LogTx::begin(&keyspace, PersistMode::Buffer, TxCredit::new(3, 100));
        tx.stage_insert(&partition, b"abcd".to_vec(), b"efgh".to_vec());
        assert_eq!(tx.remaining(), TxCredit::new(2, 92));
    }

    #[test]
    #[should_panic(expected = "credit exhausted")]
    fn test_overdraft_panics() {
        let (_dir, keyspace, partition) = keyspace_with_partition();

        let mut tx = LogTx::begin(&keyspace, PersistMode::Buffer, TxCredit::new(1, 4));
        tx.stage_insert(&partition, b"key".to_vec(), b"too large".to_vec());
    }
}
